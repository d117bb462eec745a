/// Events parsed from a streaming chat response, one network call's worth.
///
/// Ordering contract: `(ContentToken | ConsensusProposal)* → Done`. Nothing
/// follows `Done`; a stream that ends without it was cut short.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StreamEvent {
    ContentToken { text: String },
    ConsensusProposal { summary: String },
    Done,
}

impl StreamEvent {
    pub fn token(text: impl Into<String>) -> Self {
        Self::ContentToken { text: text.into() }
    }

    pub fn proposal(summary: impl Into<String>) -> Self {
        Self::ConsensusProposal {
            summary: summary.into(),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done)
    }
}
