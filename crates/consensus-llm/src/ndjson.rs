use std::collections::VecDeque;
use std::fmt::Display;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use bytes::Bytes;
use futures::{Future, Stream, StreamExt};
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use consensus_core::errors::GatewayError;
use consensus_core::stream::StreamEvent;
use consensus_core::tools::PROPOSE_CONSENSUS;

/// Parse one line of a streamed chat response into zero or more events.
///
/// Blank lines yield nothing. Content comes before a consensus proposal from
/// the same record, and `Done` is always last.
pub fn parse_line(line: &str) -> Result<Vec<StreamEvent>, GatewayError> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }

    let chunk: ChatChunk =
        serde_json::from_str(trimmed).map_err(|e| GatewayError::malformed(line, e.to_string()))?;

    if let Some(error) = chunk.error {
        return Err(GatewayError::Endpoint(error));
    }

    let done = chunk
        .done
        .ok_or_else(|| GatewayError::malformed(line, "missing `done` field"))?;

    let mut events = Vec::new();
    if let Some(message) = chunk.message {
        if let Some(content) = message.content.filter(|c| !c.is_empty()) {
            events.push(StreamEvent::ContentToken { text: content });
        }
        for call in message.tool_calls.into_iter().flatten() {
            if call.function.name != PROPOSE_CONSENSUS {
                debug!(function = %call.function.name, "ignoring unknown function call");
                continue;
            }
            let summary = consensus_summary(&call.function.arguments)
                .ok_or_else(|| GatewayError::malformed(line, "propose_consensus call without a summary"))?;
            events.push(StreamEvent::ConsensusProposal { summary });
        }
    }

    if done {
        events.push(StreamEvent::Done);
    }

    Ok(events)
}

/// Arguments usually arrive as an object, but some servers send them as a
/// JSON-encoded string.
fn consensus_summary(arguments: &Value) -> Option<String> {
    match arguments {
        Value::Object(map) => map.get("summary").and_then(Value::as_str).map(str::to_string),
        Value::String(raw) => serde_json::from_str::<Value>(raw)
            .ok()
            .and_then(|v| v.get("summary").and_then(Value::as_str).map(str::to_string)),
        _ => None,
    }
}

/// Lazily parse an iterator of lines. Stops after `Done` or the first error,
/// without pulling further lines from the source.
pub fn parse_lines<I>(lines: I) -> LineEvents<I::IntoIter>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    LineEvents {
        lines: lines.into_iter(),
        pending: VecDeque::new(),
        finished: false,
    }
}

pub struct LineEvents<I> {
    lines: I,
    pending: VecDeque<StreamEvent>,
    finished: bool,
}

impl<I> Iterator for LineEvents<I>
where
    I: Iterator,
    I::Item: AsRef<str>,
{
    type Item = Result<StreamEvent, GatewayError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(event) = self.pending.pop_front() {
                if event.is_terminal() {
                    self.finished = true;
                    self.pending.clear();
                }
                return Some(Ok(event));
            }
            if self.finished {
                return None;
            }
            let line = self.lines.next()?;
            match parse_line(line.as_ref()) {
                Ok(events) => self.pending.extend(events),
                Err(e) => {
                    self.finished = true;
                    return Some(Err(e));
                }
            }
        }
    }
}

/// Splits a byte stream into lines. Bytes are kept until a full line is
/// available so multi-byte characters split across chunks survive.
#[derive(Default)]
struct LineDecoder {
    buffer: Vec<u8>,
}

impl LineDecoder {
    fn push(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    fn next_line(&mut self) -> Option<Result<String, GatewayError>> {
        let pos = self.buffer.iter().position(|b| *b == b'\n')?;
        let raw: Vec<u8> = self.buffer.drain(..=pos).collect();
        Some(decode(&raw[..pos]))
    }

    /// Whatever is left once the connection closes.
    fn finish(&mut self) -> Option<Result<String, GatewayError>> {
        if self.buffer.is_empty() {
            return None;
        }
        let raw = std::mem::take(&mut self.buffer);
        Some(decode(&raw))
    }
}

fn decode(raw: &[u8]) -> Result<String, GatewayError> {
    String::from_utf8(raw.to_vec())
        .map_err(|_| GatewayError::malformed(String::from_utf8_lossy(raw), "invalid utf-8"))
}

type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, String>> + Send>>;

/// Wraps a response byte stream and yields parsed events.
///
/// Finishes after the first `Done` or error and never polls the connection
/// again. With an idle timeout, a connection that stays silent for that long
/// yields `GatewayError::IdleTimeout`.
pub struct NdjsonStream {
    inner: ByteStream,
    decoder: LineDecoder,
    pending: VecDeque<Result<StreamEvent, GatewayError>>,
    idle_deadline: Option<Pin<Box<tokio::time::Sleep>>>,
    idle_duration: Option<Duration>,
    inner_exhausted: bool,
    finished: bool,
}

impl NdjsonStream {
    pub fn new<S, E>(byte_stream: S, idle_timeout: Option<Duration>) -> Self
    where
        S: Stream<Item = Result<Bytes, E>> + Send + 'static,
        E: Display + 'static,
    {
        Self {
            inner: Box::pin(byte_stream.map(|r| r.map_err(|e| e.to_string()))),
            decoder: LineDecoder::default(),
            pending: VecDeque::new(),
            idle_deadline: idle_timeout.map(|d| Box::pin(tokio::time::sleep(d))),
            idle_duration: idle_timeout,
            inner_exhausted: false,
            finished: false,
        }
    }

    /// Parse one line into the pending queue. Returns true once nothing more
    /// should be read.
    fn queue_line(&mut self, line: Result<String, GatewayError>) -> bool {
        match line.and_then(|l| parse_line(&l)) {
            Ok(events) => {
                let mut stop = false;
                for event in events {
                    stop |= event.is_terminal();
                    self.pending.push_back(Ok(event));
                }
                stop
            }
            Err(e) => {
                self.pending.push_back(Err(e));
                true
            }
        }
    }
}

impl Stream for NdjsonStream {
    type Item = Result<StreamEvent, GatewayError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        loop {
            if let Some(item) = this.pending.pop_front() {
                if matches!(&item, Ok(StreamEvent::Done) | Err(_)) {
                    this.finished = true;
                    this.pending.clear();
                }
                return Poll::Ready(Some(item));
            }

            if this.finished || this.inner_exhausted {
                this.finished = true;
                return Poll::Ready(None);
            }

            match this.inner.as_mut().poll_next(cx) {
                Poll::Ready(Some(Ok(bytes))) => {
                    if let (Some(duration), Some(deadline)) =
                        (this.idle_duration, this.idle_deadline.as_mut())
                    {
                        deadline.as_mut().reset(tokio::time::Instant::now() + duration);
                    }

                    this.decoder.push(&bytes);
                    while let Some(line) = this.decoder.next_line() {
                        if this.queue_line(line) {
                            this.inner_exhausted = true;
                            break;
                        }
                    }
                }
                Poll::Ready(Some(Err(e))) => {
                    this.finished = true;
                    return Poll::Ready(Some(Err(GatewayError::StreamInterrupted(e))));
                }
                Poll::Ready(None) => {
                    this.inner_exhausted = true;
                    if let Some(line) = this.decoder.finish() {
                        this.queue_line(line);
                    }
                }
                Poll::Pending => {
                    if let (Some(duration), Some(deadline)) =
                        (this.idle_duration, this.idle_deadline.as_mut())
                    {
                        if deadline.as_mut().poll(cx).is_ready() {
                            this.finished = true;
                            return Poll::Ready(Some(Err(GatewayError::IdleTimeout(duration))));
                        }
                    }
                    return Poll::Pending;
                }
            }
        }
    }
}

// --- Deserialization types for streamed chat records ---

#[derive(Deserialize)]
struct ChatChunk {
    #[serde(default)]
    message: Option<ChunkMessage>,
    #[serde(default)]
    done: Option<bool>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Deserialize)]
struct ChunkMessage {
    #[serde(default)]
    content: Option<String>,
    /// Some servers send `null` instead of omitting the list.
    #[serde(default)]
    tool_calls: Option<Vec<ChunkToolCall>>,
}

#[derive(Deserialize)]
struct ChunkToolCall {
    function: ChunkFunction,
}

#[derive(Deserialize)]
struct ChunkFunction {
    name: String,
    #[serde(default)]
    arguments: Value,
}

#[cfg(test)]
mod tests {
    use super::*;

    const HI: &str = r#"{"message":{"content":"Hi"},"done":false}"#;
    const DONE: &str = r#"{"message":{},"done":true}"#;

    #[test]
    fn null_tool_calls_are_treated_as_empty() {
        let events = parse_line(
            r#"{"message":{"role":"assistant","content":"Hi","tool_calls":null},"done":false}"#,
        )
        .unwrap();
        assert_eq!(events, vec![StreamEvent::token("Hi")]);
    }

    fn collect(lines: &[&str]) -> Vec<Result<StreamEvent, GatewayError>> {
        parse_lines(lines.iter().copied()).collect()
    }

    #[test]
    fn content_then_done() {
        let events = collect(&[HI, DONE]);
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].as_ref().unwrap(), &StreamEvent::token("Hi"));
        assert_eq!(events[1].as_ref().unwrap(), &StreamEvent::Done);
    }

    #[test]
    fn tool_call_without_content() {
        let line = r#"{"message":{"role":"assistant","content":"","tool_calls":[{"function":{"name":"propose_consensus","arguments":{"summary":"Tabs for indentation"}}}]},"done":false}"#;
        let events = parse_line(line).unwrap();
        assert_eq!(events, vec![StreamEvent::proposal("Tabs for indentation")]);
    }

    #[test]
    fn content_precedes_proposal_in_same_record() {
        let line = r#"{"message":{"content":"Agreed.","tool_calls":[{"function":{"name":"propose_consensus","arguments":{"summary":"s"}}}]},"done":true}"#;
        let events = parse_line(line).unwrap();
        assert_eq!(
            events,
            vec![StreamEvent::token("Agreed."), StreamEvent::proposal("s"), StreamEvent::Done]
        );
    }

    #[test]
    fn string_encoded_arguments_are_accepted() {
        let line = r#"{"message":{"tool_calls":[{"function":{"name":"propose_consensus","arguments":"{\"summary\":\"ok\"}"}}]},"done":false}"#;
        assert_eq!(parse_line(line).unwrap(), vec![StreamEvent::proposal("ok")]);
    }

    #[test]
    fn other_functions_are_ignored() {
        let line = r#"{"message":{"tool_calls":[{"function":{"name":"get_weather","arguments":{}}}]},"done":false}"#;
        assert!(parse_line(line).unwrap().is_empty());
    }

    #[test]
    fn proposal_without_summary_is_malformed() {
        let line = r#"{"message":{"tool_calls":[{"function":{"name":"propose_consensus","arguments":{}}}]},"done":false}"#;
        let err = parse_line(line).unwrap_err();
        assert_eq!(err.offending_line(), Some(line));
    }

    #[test]
    fn blank_lines_are_skipped() {
        let events = collect(&["", "   ", HI, "", DONE]);
        assert_eq!(events.len(), 2);
    }

    #[test]
    fn unknown_fields_are_tolerated() {
        let line = r#"{"model":"llama3","created_at":"2024-12-09T00:00:00Z","message":{"role":"assistant","content":"x","images":null},"done":false,"extra":1}"#;
        assert_eq!(parse_line(line).unwrap(), vec![StreamEvent::token("x")]);
    }

    #[test]
    fn malformed_record_carries_raw_line() {
        let bad = r#"{"message":{"content":"Hi"},"done":fals"#;
        let events = collect(&[HI, bad, DONE]);
        assert_eq!(events.len(), 2);
        let err = events[1].as_ref().unwrap_err();
        assert!(err.is_protocol());
        assert_eq!(err.offending_line(), Some(bad));
    }

    #[test]
    fn missing_done_is_malformed() {
        let err = parse_line(r#"{"message":{"content":"Hi"}}"#).unwrap_err();
        assert!(matches!(err, GatewayError::MalformedRecord { .. }));
    }

    #[test]
    fn error_record_becomes_endpoint_error() {
        let err = parse_line(r#"{"error":"model 'nope' not found"}"#).unwrap_err();
        assert!(matches!(err, GatewayError::Endpoint(msg) if msg.contains("not found")));
    }

    #[test]
    fn stops_consuming_after_done() {
        let mut pulled = 0;
        let lines = [HI, DONE, HI, "not json at all"].into_iter().inspect(|_| pulled += 1);
        let events: Vec<_> = parse_lines(lines).collect();
        assert_eq!(events.len(), 2);
        assert!(events.iter().all(|e| e.is_ok()));
        assert_eq!(pulled, 2);
    }

    #[test]
    fn repeated_lines_are_not_deduplicated() {
        let events = collect(&[HI, HI, DONE]);
        let tokens: Vec<_> = events
            .into_iter()
            .filter_map(|e| match e {
                Ok(StreamEvent::ContentToken { text }) => Some(text),
                _ => None,
            })
            .collect();
        assert_eq!(tokens, vec!["Hi", "Hi"]);
    }

    #[test]
    fn line_decoder_keeps_split_multibyte_characters() {
        let line = "{\"message\":{\"content\":\"caf\u{e9}\"},\"done\":false}\n";
        let bytes = line.as_bytes();
        let split = line.find('\u{e9}').unwrap() + 1;

        let mut decoder = LineDecoder::default();
        decoder.push(&bytes[..split]);
        assert!(decoder.next_line().is_none());
        decoder.push(&bytes[split..]);
        let decoded = decoder.next_line().unwrap().unwrap();
        assert_eq!(parse_line(&decoded).unwrap(), vec![StreamEvent::token("caf\u{e9}")]);
        assert!(decoder.finish().is_none());
    }

    fn byte_stream(chunks: Vec<&'static str>) -> impl Stream<Item = Result<Bytes, String>> + Send {
        futures::stream::iter(chunks.into_iter().map(|c| Ok(Bytes::from(c))))
    }

    #[tokio::test]
    async fn stream_reassembles_lines_across_chunks() {
        let stream = NdjsonStream::new(
            byte_stream(vec![
                "{\"message\":{\"content\":\"He\"},\"done\":false}\n{\"message\":{\"con",
                "tent\":\"llo\"},\"done\":false}\n",
                "{\"message\":{},\"done\":true}\n",
            ]),
            None,
        );
        let events: Vec<_> = stream.collect().await;
        assert_eq!(
            events.into_iter().map(Result::unwrap).collect::<Vec<_>>(),
            vec![StreamEvent::token("He"), StreamEvent::token("llo"), StreamEvent::Done]
        );
    }

    #[tokio::test]
    async fn stream_ignores_lines_after_done() {
        let stream = NdjsonStream::new(
            byte_stream(vec![
                "{\"message\":{},\"done\":true}\n{\"message\":{\"content\":\"late\"},\"done\":false}\n",
                "garbage that would fail to parse\n",
            ]),
            None,
        );
        let events: Vec<_> = stream.collect().await;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].as_ref().unwrap(), &StreamEvent::Done);
    }

    #[tokio::test]
    async fn stream_parses_trailing_line_without_newline() {
        let stream = NdjsonStream::new(
            byte_stream(vec!["{\"message\":{\"content\":\"Hi\"},\"done\":false}\n{\"done\":true}"]),
            None,
        );
        let events: Vec<_> = stream.collect().await;
        assert_eq!(events.len(), 2);
        assert_eq!(events[1].as_ref().unwrap(), &StreamEvent::Done);
    }

    #[tokio::test]
    async fn stream_without_done_just_ends() {
        let stream = NdjsonStream::new(byte_stream(vec![HI, "\n"]), None);
        let events: Vec<_> = stream.collect().await;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].as_ref().unwrap(), &StreamEvent::token("Hi"));
    }

    #[tokio::test]
    async fn transport_error_ends_stream() {
        let chunks: Vec<Result<Bytes, String>> = vec![
            Ok(Bytes::from(format!("{HI}\n"))),
            Err("connection reset".to_string()),
            Ok(Bytes::from(format!("{DONE}\n"))),
        ];
        let stream = NdjsonStream::new(futures::stream::iter(chunks), None);
        let events: Vec<_> = stream.collect().await;
        assert_eq!(events.len(), 2);
        assert!(matches!(&events[1], Err(GatewayError::StreamInterrupted(msg)) if msg == "connection reset"));
    }

    #[tokio::test]
    async fn idle_timeout_fires_when_no_data() {
        tokio::time::pause();

        let pending = futures::stream::pending::<Result<Bytes, String>>();
        let mut stream = Box::pin(NdjsonStream::new(pending, Some(Duration::from_secs(5))));

        tokio::time::advance(Duration::from_secs(6)).await;

        let event = stream.next().await;
        assert!(
            matches!(&event, Some(Err(GatewayError::IdleTimeout(d))) if *d == Duration::from_secs(5)),
            "expected idle timeout, got: {event:?}"
        );
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn idle_timeout_resets_on_data() {
        tokio::time::pause();

        let (tx, rx) = tokio::sync::mpsc::channel::<Result<Bytes, String>>(16);
        let rx_stream = tokio_stream::wrappers::ReceiverStream::new(rx);
        let mut stream = Box::pin(NdjsonStream::new(rx_stream, Some(Duration::from_secs(5))));

        tx.send(Ok(Bytes::from(format!("{HI}\n")))).await.unwrap();
        assert!(matches!(stream.next().await, Some(Ok(StreamEvent::ContentToken { .. }))));

        tokio::time::advance(Duration::from_secs(4)).await;

        tx.send(Ok(Bytes::from(format!("{DONE}\n")))).await.unwrap();
        assert!(matches!(stream.next().await, Some(Ok(StreamEvent::Done))));
        assert!(stream.next().await.is_none());
    }
}
