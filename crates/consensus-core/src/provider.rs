use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;

use crate::errors::GatewayError;
use crate::messages::Message;
use crate::stream::StreamEvent;

/// Events of one streamed reply. Ends after `StreamEvent::Done` or the first error.
pub type EventStream = Pin<Box<dyn Stream<Item = Result<StreamEvent, GatewayError>> + Send>>;

/// A chat endpoint that can serve any model it hosts.
///
/// One call is one turn: the full history goes out, the reply streams back.
/// Implementations must fail before yielding anything when the endpoint
/// rejects the request.
#[async_trait]
pub trait ChatProvider: Send + Sync {
    fn name(&self) -> &str;

    /// Base URL or other human-readable address, for logs.
    fn endpoint(&self) -> &str;

    async fn stream(&self, model: &str, messages: &[Message]) -> Result<EventStream, GatewayError>;
}
