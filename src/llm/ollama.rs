//! Ollama HTTP client
//!
//! Speaks `/api/generate` and `/api/chat`.
//! Uses a long-lived reqwest::Client for connection pooling.

use super::{ChatReply, ChatRequest, ModelBackend, StreamStart};
use crate::error::AgentError;
use crate::models::Message;
use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, error};

/// Reusable Ollama client (connection-pooled)
pub struct OllamaClient {
    client: Client,
    base_url: String,
}

impl OllamaClient {
    pub fn new(base_url: &str) -> crate::Result<Self> {
        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(8)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn post<T: Serialize + ?Sized>(&self, path: &str, body: &T) -> crate::Result<Response> {
        let url = format!("{}{}", self.base_url, path);

        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| {
                error!("Ollama request to {} failed: {}", path, e);
                AgentError::LlmError(format!("Ollama request to {} failed: {}", path, e))
            })?;

        if response.status().is_success() {
            return Ok(response);
        }

        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorBody>(&text)
            .map(|b| b.error)
            .unwrap_or(text);

        error!("Ollama error response ({}): {}", status, message);

        if status == StatusCode::NOT_FOUND && message.to_lowercase().contains("model") {
            return Err(AgentError::ModelUnavailable(message));
        }
        Err(AgentError::LlmError(format!("Ollama returned {}: {}", status, message)))
    }
}

#[async_trait]
impl ModelBackend for OllamaClient {
    async fn generate(&self, model: &str, prompt: &str) -> crate::Result<String> {
        let request = GenerateRequest {
            model,
            prompt,
            stream: false,
        };

        let reply: GenerateResponse = self
            .post("/api/generate", &request)
            .await?
            .json()
            .await
            .map_err(|e| AgentError::LlmError(format!("Ollama parse error: {}", e)))?;

        if let Some(err) = reply.error {
            return Err(AgentError::LlmError(err));
        }
        Ok(reply.response)
    }

    async fn generate_stream_start(&self, model: &str, prompt: &str) -> crate::Result<StreamStart> {
        let request = GenerateRequest {
            model,
            prompt,
            stream: true,
        };

        let mut response = self.post("/api/generate", &request).await?;

        let chunk = response
            .chunk()
            .await?
            .ok_or_else(|| AgentError::LlmError("stream closed before first chunk".to_string()))?;

        let text = String::from_utf8_lossy(&chunk);
        debug!(model, bytes = chunk.len(), "First stream chunk received");

        let first_line = text.lines().find(|l| !l.trim().is_empty()).unwrap_or_default();
        match serde_json::from_str::<GenerateResponse>(first_line) {
            Ok(GenerateResponse { error: Some(err), .. }) => Err(AgentError::LlmError(err)),
            Ok(GenerateResponse { done: true, response, .. }) => Ok(StreamStart::Complete { response }),
            Ok(GenerateResponse { response, .. }) => Ok(StreamStart::FirstChunk(response)),
            // Partial JSON line: the chunk boundary fell mid-object, which still
            // proves the stream is flowing.
            Err(_) => Ok(StreamStart::FirstChunk(first_line.to_string())),
        }
    }

    async fn chat(&self, request: ChatRequest<'_>) -> crate::Result<ChatReply> {
        let body = ChatBody {
            model: request.model,
            messages: request.messages,
            tools: request.tools,
            stream: false,
            options: ChatOptions {
                num_ctx: request.num_ctx,
            },
        };

        let reply: ChatResponse = self
            .post("/api/chat", &body)
            .await?
            .json()
            .await
            .map_err(|e| AgentError::LlmError(format!("Ollama parse error: {}", e)))?;

        if let Some(err) = reply.error {
            return Err(AgentError::LlmError(err));
        }

        let message = reply.message.unwrap_or_default();
        Ok(ChatReply {
            content: message.content,
            tool_calls: message.tool_calls,
        })
    }
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: String,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Serialize)]
struct ChatBody<'a> {
    model: &'a str,
    messages: &'a [Message],
    tools: &'a [Value],
    stream: bool,
    options: ChatOptions,
}

#[derive(Debug, Serialize)]
struct ChatOptions {
    num_ctx: u32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    message: Option<ChatMessage>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: String,
    #[serde(default)]
    tool_calls: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_body_serialization() {
        let messages = vec![Message::system("be brief"), Message::tool("code_exec", "1")];
        let tools = vec![serde_json::json!({"type": "function"})];
        let body = ChatBody {
            model: "qwen3:8b",
            messages: &messages,
            tools: &tools,
            stream: false,
            options: ChatOptions { num_ctx: 2048 },
        };

        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["model"], "qwen3:8b");
        assert_eq!(json["messages"][1]["role"], "tool");
        assert_eq!(json["messages"][1]["tool_name"], "code_exec");
        assert_eq!(json["options"]["num_ctx"], 2048);
        assert_eq!(json["stream"], false);
    }

    #[test]
    fn test_chat_response_with_tool_calls() {
        let raw = r#"{
            "model": "qwen3:8b",
            "message": {
                "role": "assistant",
                "content": "",
                "tool_calls": [{"function": {"name": "search_web", "arguments": {"query": "rust"}}}]
            },
            "done": true
        }"#;

        let reply: ChatResponse = serde_json::from_str(raw).unwrap();
        let message = reply.message.unwrap();
        assert!(message.content.is_empty());
        assert_eq!(message.tool_calls.len(), 1);
        assert_eq!(message.tool_calls[0]["function"]["name"], "search_web");
    }

    #[test]
    fn test_generate_response_defaults() {
        let chunk: GenerateResponse =
            serde_json::from_str(r#"{"model":"m","response":"Ho","done":false}"#).unwrap();
        assert_eq!(chunk.response, "Ho");
        assert!(!chunk.done);
        assert!(chunk.error.is_none());
    }

    #[test]
    fn test_base_url_trimmed() {
        let client = OllamaClient::new("http://localhost:11434/").unwrap();
        assert_eq!(client.base_url(), "http://localhost:11434");
    }
}
