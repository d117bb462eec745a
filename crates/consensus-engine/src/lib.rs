pub mod consensus;
pub mod error;
pub mod history;
pub mod prompts;
pub mod runner;

pub use consensus::ConsensusState;
pub use error::EngineError;
pub use history::DualHistory;
pub use runner::{run_conversation, DebateOutcome, DebateRunner, RunnerConfig};
