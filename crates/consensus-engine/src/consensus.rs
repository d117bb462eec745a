use consensus_core::participant::Slot;

/// Per-participant agreement flags. Flags only ever go from false to true.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ConsensusState {
    flags: [bool; 2],
}

impl ConsensusState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the flag for `slot`. Returns true if it was not already set.
    pub fn mark(&mut self, slot: Slot) -> bool {
        let flag = &mut self.flags[slot.index()];
        let newly = !*flag;
        *flag = true;
        newly
    }

    pub fn is_set(&self, slot: Slot) -> bool {
        self.flags[slot.index()]
    }

    /// Both participants have agreed.
    pub fn is_unanimous(&self) -> bool {
        self.flags[0] && self.flags[1]
    }
}

/// Whether `text` ends with `sentinel` as its final word, allowing one
/// trailing period and surrounding whitespace. Matching is case-sensitive.
pub fn ends_with_sentinel(text: &str, sentinel: &str) -> bool {
    if sentinel.is_empty() {
        return false;
    }
    let trimmed = text.trim_end();
    let trimmed = trimmed.strip_suffix('.').unwrap_or(trimmed);
    trimmed.split_whitespace().next_back() == Some(sentinel)
}
