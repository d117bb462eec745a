use std::collections::VecDeque;

use async_trait::async_trait;
use futures::stream;
use parking_lot::Mutex;

use consensus_core::errors::GatewayError;
use consensus_core::messages::Message;
use consensus_core::provider::{ChatProvider, EventStream};
use consensus_core::stream::StreamEvent;

use crate::ndjson;

/// Pre-programmed responses for deterministic testing without a server.
#[derive(Clone, Debug)]
pub enum MockResponse {
    /// Yield these items in order.
    Stream(Vec<Result<StreamEvent, GatewayError>>),
    /// Raw response lines, run through the real line parser.
    Ndjson(Vec<String>),
    /// Fail the `stream()` call itself, before anything is yielded.
    Error(GatewayError),
}

impl MockResponse {
    /// A single-token reply.
    pub fn text(text: &str) -> Self {
        Self::chunks(&[text])
    }

    /// A reply streamed as several tokens.
    pub fn chunks(tokens: &[&str]) -> Self {
        let mut items: Vec<_> = tokens.iter().map(|t| Ok(StreamEvent::token(*t))).collect();
        items.push(Ok(StreamEvent::Done));
        Self::Stream(items)
    }

    /// A reply that also calls the consensus function.
    pub fn consensus(text: &str, summary: &str) -> Self {
        Self::Stream(vec![
            Ok(StreamEvent::token(text)),
            Ok(StreamEvent::proposal(summary)),
            Ok(StreamEvent::Done),
        ])
    }

    /// Tokens followed by the connection closing without `Done`.
    pub fn truncated(tokens: &[&str]) -> Self {
        Self::Stream(tokens.iter().map(|t| Ok(StreamEvent::token(*t))).collect())
    }

    /// Tokens followed by a mid-stream failure.
    pub fn stream_error(tokens: &[&str], error: GatewayError) -> Self {
        let mut items: Vec<_> = tokens.iter().map(|t| Ok(StreamEvent::token(*t))).collect();
        items.push(Err(error));
        Self::Stream(items)
    }

    pub fn ndjson(lines: &[&str]) -> Self {
        Self::Ndjson(lines.iter().map(|l| l.to_string()).collect())
    }
}

/// A request the mock received.
#[derive(Clone, Debug)]
pub struct RecordedRequest {
    pub model: String,
    pub messages: Vec<Message>,
}

/// Mock provider that returns pre-programmed responses in sequence and
/// records every request.
pub struct MockProvider {
    responses: Mutex<VecDeque<MockResponse>>,
    requests: Mutex<Vec<RecordedRequest>>,
}

impl MockProvider {
    pub fn new(responses: Vec<MockResponse>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().len()
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl ChatProvider for MockProvider {
    fn name(&self) -> &str {
        "mock"
    }

    fn endpoint(&self) -> &str {
        "mock://"
    }

    async fn stream(&self, model: &str, messages: &[Message]) -> Result<EventStream, GatewayError> {
        let call = {
            let mut requests = self.requests.lock();
            requests.push(RecordedRequest {
                model: model.to_string(),
                messages: messages.to_vec(),
            });
            requests.len()
        };

        let response = self.responses.lock().pop_front().ok_or_else(|| {
            GatewayError::Network(format!("MockProvider: no response configured for call {call}"))
        })?;

        match response {
            MockResponse::Stream(items) => Ok(Box::pin(stream::iter(items))),
            MockResponse::Ndjson(lines) => {
                let items: Vec<_> = ndjson::parse_lines(lines).collect();
                Ok(Box::pin(stream::iter(items)))
            }
            MockResponse::Error(e) => Err(e),
        }
    }
}
