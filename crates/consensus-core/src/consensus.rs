use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Which signals count as a participant declaring consensus.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsensusDetection {
    /// Only an explicit `propose_consensus` function call.
    Structured,
    /// Only the trailing sentinel word in the reply text.
    Sentinel,
    /// Either of the above.
    #[default]
    Both,
}

impl ConsensusDetection {
    /// Whether the consensus function is declared to the model.
    pub fn uses_tool(self) -> bool {
        matches!(self, Self::Structured | Self::Both)
    }

    pub fn uses_sentinel(self) -> bool {
        matches!(self, Self::Sentinel | Self::Both)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Structured => "structured",
            Self::Sentinel => "sentinel",
            Self::Both => "both",
        }
    }
}

impl fmt::Display for ConsensusDetection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConsensusDetection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "structured" => Ok(Self::Structured),
            "sentinel" => Ok(Self::Sentinel),
            "both" => Ok(Self::Both),
            other => Err(format!(
                "unknown consensus detection '{other}' (expected structured, sentinel or both)"
            )),
        }
    }
}

/// How a consensus declaration was recognised.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsensusSource {
    ToolCall,
    Sentinel,
}
