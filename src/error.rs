//! Error types for the tool-calling agent

use std::error::Error as StdError;
use std::fmt::Write as _;
use thiserror::Error;

/// Result type alias for agent operations
pub type Result<T> = std::result::Result<T, AgentError>;

#[derive(Error, Debug)]
pub enum AgentError {

    // =============================
    // Core Pipeline Errors
    // =============================

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("LLM error: {0}")]
    LlmError(String),

    #[error("Model unavailable: {0}")]
    ModelUnavailable(String),

    #[error("Tool error: {0}")]
    ToolError(String),

    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    #[error("Invalid tool input: {0}")]
    InvalidToolInput(String),

    #[error("Malformed tool call: {0}")]
    MalformedToolCall(String),

    #[error("Sandbox error: {0}")]
    SandboxError(String),

    #[error("Search error: {0}")]
    SearchError(String),

    // =============================
    // External Library Conversions
    // =============================

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("HTTP client error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl AgentError {
    /// True when the error says the resolved model can no longer be served.
    ///
    /// Backends do not agree on a status code for this, so the message text is
    /// checked as well.
    pub fn is_model_missing(&self) -> bool {
        if matches!(self, AgentError::ModelUnavailable(_)) {
            return true;
        }
        let text = self.to_string().to_lowercase();
        text.contains("not found") && text.contains("model")
    }
}

/// Render an error as a one-line message followed by its full source chain.
pub fn render_error_trace(label: &str, err: &(dyn StdError + 'static)) -> String {
    let mut out = format!("[ERROR {}] {}\nError trace:\n", label, err);
    let mut current: Option<&(dyn StdError + 'static)> = Some(err);
    let mut depth = 0;
    while let Some(e) = current {
        let _ = writeln!(out, "  {}: {}", depth, e);
        current = e.source();
        depth += 1;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_missing_variant() {
        let err = AgentError::ModelUnavailable("qwen3:8b".to_string());
        assert!(err.is_model_missing());
    }

    #[test]
    fn test_model_missing_from_backend_text() {
        let err = AgentError::LlmError("model \"llama9\" not found, try pulling it first".to_string());
        assert!(err.is_model_missing());

        let other = AgentError::LlmError("connection refused".to_string());
        assert!(!other.is_model_missing());
    }

    #[test]
    fn test_render_error_trace_walks_sources() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk gone");
        let err = AgentError::from(io);
        let rendered = render_error_trace("running code_exec", &err);

        assert!(rendered.starts_with("[ERROR running code_exec] IO error: disk gone"));
        assert!(rendered.contains("Error trace:"));
        assert!(rendered.contains("  0: IO error: disk gone"));
    }
}
