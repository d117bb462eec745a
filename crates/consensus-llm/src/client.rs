use futures::StreamExt;
use tracing::{debug, instrument};

use consensus_core::errors::GatewayError;
use consensus_core::messages::Message;
use consensus_core::provider::ChatProvider;
use consensus_core::stream::StreamEvent;

/// Receives the events of one turn as they stream in.
pub trait TurnSink: Send {
    fn on_token(&mut self, token: &str);
    fn on_consensus(&mut self, summary: &str);
}

/// Adapts a pair of closures into a [`TurnSink`].
pub struct Handlers<T, C> {
    pub on_token: T,
    pub on_consensus: C,
}

impl<T, C> TurnSink for Handlers<T, C>
where
    T: FnMut(&str) + Send,
    C: FnMut(&str) + Send,
{
    fn on_token(&mut self, token: &str) {
        (self.on_token)(token)
    }

    fn on_consensus(&mut self, summary: &str) {
        (self.on_consensus)(summary)
    }
}

/// Run one turn against `provider` and return the full reply text.
///
/// Handlers are invoked in stream order before this returns. A stream that
/// closes without a `Done` record is a protocol error; nothing is retried.
#[instrument(skip(provider, history, sink), fields(provider = provider.name(), history = history.len()))]
pub async fn ask_model(
    provider: &dyn ChatProvider,
    model: &str,
    history: &[Message],
    sink: &mut dyn TurnSink,
) -> Result<String, GatewayError> {
    let mut stream = provider.stream(model, history).await?;
    let mut text = String::new();

    while let Some(event) = stream.next().await {
        match event? {
            StreamEvent::ContentToken { text: token } => {
                sink.on_token(&token);
                text.push_str(&token);
            }
            StreamEvent::ConsensusProposal { summary } => {
                sink.on_consensus(&summary);
            }
            StreamEvent::Done => {
                debug!(chars = text.len(), "turn stream complete");
                return Ok(text);
            }
        }
    }

    Err(GatewayError::StreamIncomplete)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockProvider, MockResponse};

    #[derive(Default)]
    struct Recorder {
        calls: Vec<String>,
    }

    impl TurnSink for Recorder {
        fn on_token(&mut self, token: &str) {
            self.calls.push(format!("token:{token}"));
        }

        fn on_consensus(&mut self, summary: &str) {
            self.calls.push(format!("consensus:{summary}"));
        }
    }

    #[tokio::test]
    async fn accumulates_tokens_in_order() {
        let mock = MockProvider::new(vec![MockResponse::chunks(&["The ", "sky ", "is blue"])]);
        let mut sink = Recorder::default();

        let text = ask_model(&mock, "m", &[Message::user("q")], &mut sink).await.unwrap();

        assert_eq!(text, "The sky is blue");
        assert_eq!(sink.calls, vec!["token:The ", "token:sky ", "token:is blue"]);
    }

    #[tokio::test]
    async fn consensus_interleaves_with_tokens() {
        let mock = MockProvider::new(vec![MockResponse::consensus("I agree.", "Both prefer tea")]);
        let mut sink = Recorder::default();

        let text = ask_model(&mock, "m", &[], &mut sink).await.unwrap();

        assert_eq!(text, "I agree.");
        assert_eq!(sink.calls, vec!["token:I agree.", "consensus:Both prefer tea"]);
    }

    #[tokio::test]
    async fn closure_handlers() {
        let mock = MockProvider::new(vec![MockResponse::text("Hi")]);
        let mut tokens = Vec::new();
        let mut proposals = 0;

        let text = {
            let mut handlers = Handlers {
                on_token: |t: &str| tokens.push(t.to_string()),
                on_consensus: |_: &str| proposals += 1,
            };
            ask_model(&mock, "m", &[], &mut handlers).await.unwrap()
        };

        assert_eq!(text, "Hi");
        assert_eq!(tokens, vec!["Hi"]);
        assert_eq!(proposals, 0);
    }

    #[tokio::test]
    async fn missing_done_is_protocol_error() {
        let mock = MockProvider::new(vec![MockResponse::truncated(&["partial"])]);
        let mut sink = Recorder::default();

        let err = ask_model(&mock, "m", &[], &mut sink).await.unwrap_err();

        assert!(matches!(err, GatewayError::StreamIncomplete));
        assert!(err.is_protocol());
        assert_eq!(sink.calls, vec!["token:partial"]);
    }

    #[tokio::test]
    async fn mid_stream_failure_surfaces_after_delivered_tokens() {
        let mock = MockProvider::new(vec![MockResponse::stream_error(
            &["We ", "might"],
            GatewayError::StreamInterrupted("connection reset".into()),
        )]);
        let mut sink = Recorder::default();

        let err = ask_model(&mock, "m", &[], &mut sink).await.unwrap_err();

        assert!(matches!(err, GatewayError::StreamInterrupted(_)));
        assert_eq!(sink.calls, vec!["token:We ", "token:might"]);
    }

    #[tokio::test]
    async fn rejected_request_invokes_no_handler() {
        let mock = MockProvider::new(vec![MockResponse::Error(GatewayError::Status { status: 503 })]);
        let mut sink = Recorder::default();

        let err = ask_model(&mock, "m", &[], &mut sink).await.unwrap_err();

        assert!(err.is_network());
        assert!(sink.calls.is_empty());
    }

    #[tokio::test]
    async fn malformed_line_aborts_turn() {
        let mock = MockProvider::new(vec![MockResponse::ndjson(&[
            r#"{"message":{"content":"ok"},"done":false}"#,
            "{not json",
            r#"{"message":{},"done":true}"#,
        ])]);
        let mut sink = Recorder::default();

        let err = ask_model(&mock, "m", &[], &mut sink).await.unwrap_err();

        assert_eq!(err.offending_line(), Some("{not json"));
        assert_eq!(sink.calls, vec!["token:ok"]);
    }
}
