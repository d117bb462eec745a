pub mod consensus;
pub mod errors;
pub mod events;
pub mod ids;
pub mod messages;
pub mod participant;
pub mod provider;
pub mod stream;
pub mod tools;

pub use consensus::ConsensusDetection;
pub use errors::GatewayError;
pub use messages::{ConversationView, Message, Role};
pub use participant::{Participant, Slot};
pub use provider::ChatProvider;
pub use stream::StreamEvent;
