use std::fmt;

use serde::{Deserialize, Serialize};

/// One of the two seats at the table.
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, Serialize, Deserialize)]
pub enum Slot {
    First,
    Second,
}

impl Slot {
    /// Parse a caller-supplied index. Only 0 and 1 are valid.
    pub fn from_index(index: usize) -> Option<Self> {
        match index {
            0 => Some(Self::First),
            1 => Some(Self::Second),
            _ => None,
        }
    }

    pub fn index(self) -> usize {
        match self {
            Self::First => 0,
            Self::Second => 1,
        }
    }

    pub fn other(self) -> Self {
        match self {
            Self::First => Self::Second,
            Self::Second => Self::First,
        }
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.index())
    }
}

/// A model taking part in the debate. The name is the model identifier sent
/// to the endpoint and the attribution shown to the other side.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    pub name: String,
    pub slot: Slot,
}

impl Participant {
    pub fn new(name: impl Into<String>, slot: Slot) -> Self {
        Self {
            name: name.into(),
            slot,
        }
    }

    /// Build the pair from two model identifiers, in slot order.
    pub fn pair(first: impl Into<String>, second: impl Into<String>) -> [Participant; 2] {
        [
            Participant::new(first, Slot::First),
            Participant::new(second, Slot::Second),
        ]
    }
}

impl fmt::Display for Participant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}
