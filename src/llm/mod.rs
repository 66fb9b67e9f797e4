//! Model backend trait and implementations
//!
//! The language model runtime is a black-box request/response service.
//! Everything the agent needs from it goes through [`ModelBackend`].

use crate::models::Message;
use crate::Result;
use async_trait::async_trait;
use serde_json::Value;

pub mod ollama;
pub use ollama::OllamaClient;

/// What a streaming generation request yielded before it was abandoned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamStart {
    /// At least one chunk of a streamed reply arrived
    FirstChunk(String),
    /// The backend answered with a single complete object instead of a stream
    Complete { response: String },
}

/// Chat request sent on every dispatch: full log plus the tool catalog.
#[derive(Debug, Clone, Copy)]
pub struct ChatRequest<'a> {
    pub model: &'a str,
    pub messages: &'a [Message],
    pub tools: &'a [Value],
    pub num_ctx: u32,
}

/// The model's reply to a chat request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChatReply {
    pub content: String,
    /// Raw `tool_calls` entries; parsed (and possibly rejected) by the router
    pub tool_calls: Vec<Value>,
}

/// Trait for model access
#[async_trait]
pub trait ModelBackend: Send + Sync {
    /// Single non-streaming generation; returns the full response text.
    async fn generate(&self, model: &str, prompt: &str) -> Result<String>;

    /// Streaming generation that stops after the first chunk.
    async fn generate_stream_start(&self, model: &str, prompt: &str) -> Result<StreamStart>;

    /// Chat completion with tools enabled.
    async fn chat(&self, request: ChatRequest<'_>) -> Result<ChatReply>;
}
