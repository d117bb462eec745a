//! Settings error types.

use thiserror::Error;

/// Errors that can occur when loading or validating settings.
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("cannot read settings file: {0}")]
    Io(#[from] std::io::Error),
    /// The file is not valid JSON or a value has the wrong type.
    #[error("malformed settings: {0}")]
    Json(#[from] serde_json::Error),
    /// A required key is absent or empty after all layers were applied.
    #[error("missing required setting '{0}'")]
    MissingKey(&'static str),
    /// A settings value was invalid (e.g., wrong URL scheme).
    #[error("invalid setting: {0}")]
    InvalidValue(String),
}

pub type Result<T> = std::result::Result<T, SettingsError>;
