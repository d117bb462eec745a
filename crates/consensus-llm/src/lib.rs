pub mod client;
pub mod converter;
pub mod ndjson;
pub mod provider;

pub mod mock;

pub use client::{ask_model, Handlers, TurnSink};
pub use mock::{MockProvider, MockResponse};
pub use provider::{OllamaConfig, OllamaProvider};
