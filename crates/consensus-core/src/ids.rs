use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Identifies one debate run in logs and events.
#[derive(Clone, Debug, Hash, Eq, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DebateId(String);

impl DebateId {
    pub fn new() -> Self {
        Self(format!("debate_{}", Uuid::now_v7()))
    }

    pub fn from_raw(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for DebateId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for DebateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for DebateId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
