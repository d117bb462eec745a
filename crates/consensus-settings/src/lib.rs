//! Layered settings for the debate runner.
//!
//! Priority, lowest first: compiled defaults, `consensus.json` (deep-merged),
//! `CONSENSUS_*` environment variables. The CLI applies its own flags on top
//! and then calls [`ConsensusSettings::validate`].

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{deep_merge, load_settings_from_path, settings_path};
pub use types::{ConsensusSettings, LoggingSettings};
