use serde::{Deserialize, Serialize};

use crate::consensus::ConsensusSource;
use crate::ids::DebateId;
use crate::participant::Slot;

/// Debate lifecycle events emitted by the runner for whoever renders them.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum DebateEvent {
    #[serde(rename = "debate_start")]
    DebateStart {
        debate_id: DebateId,
        topic: String,
        starting: Slot,
    },

    #[serde(rename = "turn_start")]
    TurnStart {
        debate_id: DebateId,
        slot: Slot,
        participant: String,
        turn: u32,
    },

    #[serde(rename = "text_delta")]
    TextDelta {
        debate_id: DebateId,
        slot: Slot,
        delta: String,
    },

    #[serde(rename = "consensus_proposed")]
    ConsensusProposed {
        debate_id: DebateId,
        slot: Slot,
        participant: String,
        summary: Option<String>,
        source: ConsensusSource,
    },

    #[serde(rename = "turn_complete")]
    TurnComplete {
        debate_id: DebateId,
        slot: Slot,
        turn: u32,
        text: String,
    },

    #[serde(rename = "debate_complete")]
    DebateComplete { debate_id: DebateId, turns: u32 },
}

impl DebateEvent {
    pub fn debate_id(&self) -> &DebateId {
        match self {
            Self::DebateStart { debate_id, .. }
            | Self::TurnStart { debate_id, .. }
            | Self::TextDelta { debate_id, .. }
            | Self::ConsensusProposed { debate_id, .. }
            | Self::TurnComplete { debate_id, .. }
            | Self::DebateComplete { debate_id, .. } => debate_id,
        }
    }
}
