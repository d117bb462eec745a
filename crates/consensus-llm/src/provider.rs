use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, instrument};

use consensus_core::consensus::ConsensusDetection;
use consensus_core::errors::GatewayError;
use consensus_core::messages::Message;
use consensus_core::provider::{ChatProvider, EventStream};
use consensus_core::tools::ToolDefinition;

use crate::converter;
use crate::ndjson::NdjsonStream;

const CHAT_PATH: &str = "api/chat/";
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Connection settings for an Ollama-compatible chat endpoint.
#[derive(Clone, Debug)]
pub struct OllamaConfig {
    pub base_url: String,
    pub detection: ConsensusDetection,
    pub idle_timeout: Option<Duration>,
}

impl OllamaConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            detection: ConsensusDetection::default(),
            idle_timeout: None,
        }
    }
}

pub struct OllamaProvider {
    client: Client,
    base_url: String,
    chat_url: String,
    tools: Vec<ToolDefinition>,
    idle_timeout: Option<Duration>,
}

impl OllamaProvider {
    pub fn new(config: OllamaConfig) -> Result<Self, GatewayError> {
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| GatewayError::Network(e.to_string()))?;

        // Declared once and sent unchanged with every request.
        let tools = if config.detection.uses_tool() {
            vec![ToolDefinition::propose_consensus()]
        } else {
            Vec::new()
        };

        Ok(Self {
            client,
            chat_url: chat_url(&config.base_url),
            base_url: config.base_url,
            tools,
            idle_timeout: config.idle_timeout,
        })
    }

    pub fn chat_url(&self) -> &str {
        &self.chat_url
    }

    pub fn declares_consensus_tool(&self) -> bool {
        !self.tools.is_empty()
    }
}

/// `{base}api/chat/`, adding the separating slash when the base lacks one.
pub fn chat_url(base_url: &str) -> String {
    if base_url.ends_with('/') {
        format!("{base_url}{CHAT_PATH}")
    } else {
        format!("{base_url}/{CHAT_PATH}")
    }
}

#[async_trait]
impl ChatProvider for OllamaProvider {
    fn name(&self) -> &str {
        "ollama"
    }

    fn endpoint(&self) -> &str {
        &self.base_url
    }

    #[instrument(skip(self, messages), fields(messages = messages.len()))]
    async fn stream(&self, model: &str, messages: &[Message]) -> Result<EventStream, GatewayError> {
        let body = converter::build_request_body(model, messages, &self.tools);

        let resp = self
            .client
            .post(&self.chat_url)
            .header("accept", "application/x-ndjson")
            .json(&body)
            .send()
            .await
            .map_err(|e| GatewayError::Network(e.to_string()))?;

        // The body of a rejected request is never read.
        if !resp.status().is_success() {
            return Err(GatewayError::Status {
                status: resp.status().as_u16(),
            });
        }

        debug!(status = resp.status().as_u16(), "chat stream opened");
        Ok(Box::pin(NdjsonStream::new(resp.bytes_stream(), self.idle_timeout)))
    }
}
