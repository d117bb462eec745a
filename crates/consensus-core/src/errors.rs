use std::time::Duration;

/// Typed error hierarchy for a single model call.
/// Every variant is either a network failure or a protocol violation; none
/// are retried.
#[derive(Clone, Debug, thiserror::Error)]
pub enum GatewayError {
    // Network
    #[error("network error: {0}")]
    Network(String),
    #[error("endpoint returned status {status}")]
    Status { status: u16 },
    #[error("stream interrupted: {0}")]
    StreamInterrupted(String),
    #[error("stream idle for {0:?}")]
    IdleTimeout(Duration),

    // Protocol
    #[error("endpoint reported an error: {0}")]
    Endpoint(String),
    #[error("malformed stream record ({reason}): {line}")]
    MalformedRecord { line: String, reason: String },
    #[error("stream closed before completion")]
    StreamIncomplete,
}

impl GatewayError {
    pub fn is_network(&self) -> bool {
        matches!(
            self,
            Self::Network(_) | Self::Status { .. } | Self::StreamInterrupted(_) | Self::IdleTimeout(_)
        )
    }

    pub fn is_protocol(&self) -> bool {
        !self.is_network()
    }

    /// The raw line that could not be parsed, if that is what failed.
    pub fn offending_line(&self) -> Option<&str> {
        match self {
            Self::MalformedRecord { line, .. } => Some(line),
            _ => None,
        }
    }

    /// Short classification string for logging.
    pub fn error_kind(&self) -> &'static str {
        match self {
            Self::Network(_) => "network",
            Self::Status { .. } => "status",
            Self::StreamInterrupted(_) => "stream_interrupted",
            Self::IdleTimeout(_) => "idle_timeout",
            Self::Endpoint(_) => "endpoint",
            Self::MalformedRecord { .. } => "malformed_record",
            Self::StreamIncomplete => "stream_incomplete",
        }
    }

    pub fn malformed(line: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedRecord {
            line: line.into(),
            reason: reason.into(),
        }
    }
}
