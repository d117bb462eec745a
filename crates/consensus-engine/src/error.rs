use consensus_core::errors::GatewayError;
use consensus_core::participant::Slot;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("turn {turn} by {participant} (slot {slot}) failed: {source}")]
    Turn {
        participant: String,
        slot: Slot,
        turn: u32,
        #[source]
        source: GatewayError,
    },

    #[error("no consensus after {0} turns")]
    MaxTurnsExceeded(u32),

    #[error("starting index must be 0 or 1, got {0}")]
    InvalidStart(usize),

    #[error("topic cannot be empty")]
    EmptyTopic,
}

impl EngineError {
    /// The model call failure behind this error, if any.
    pub fn gateway_error(&self) -> Option<&GatewayError> {
        match self {
            Self::Turn { source, .. } => Some(source),
            _ => None,
        }
    }
}
