//! Environment-driven configuration
//!
//! Values come from the process environment (optionally seeded from `.env`
//! by the binary). Bad values are logged and replaced by defaults.

use std::env;
use tracing::{debug, info, warn};

pub const DEFAULT_MODEL: &str = "qwen3:8b";
pub const DEFAULT_OLLAMA_HOST: &str = "http://localhost:11434";
pub const DEFAULT_NUM_CTX: u32 = 2048;
pub const DEFAULT_PYTHON: &str = "python3";
pub const DEFAULT_SEARCH_MAX_RESULTS: usize = 5;

/// Well-known models tried after the preferred one
pub const FALLBACK_MODELS: &[&str] = &["qwen3:8b", "deepseek-r1:8b", "qwen2.5", "llama3.1:8b"];

const SUSPICIOUS_CHARS: &[char] = &['$', '%', '@', '#'];

#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Preferred model: the validated `MODEL` override or the default
    pub model: String,
    pub ollama_host: String,
    pub num_ctx: u32,
    pub python: String,
    pub search_max_results: usize,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            ollama_host: DEFAULT_OLLAMA_HOST.to_string(),
            num_ctx: DEFAULT_NUM_CTX,
            python: DEFAULT_PYTHON.to_string(),
            search_max_results: DEFAULT_SEARCH_MAX_RESULTS,
        }
    }
}

impl AgentConfig {
    pub fn from_env() -> Self {
        let model = resolve_model_override(env::var("MODEL").ok().as_deref());

        let ollama_host = env::var("OLLAMA_HOST")
            .ok()
            .filter(|h| !h.trim().is_empty())
            .map(|h| normalize_host(&h))
            .unwrap_or_else(|| DEFAULT_OLLAMA_HOST.to_string());

        Self {
            model,
            ollama_host,
            num_ctx: parse_or_default("AGENT_NUM_CTX", DEFAULT_NUM_CTX),
            python: env::var("SANDBOX_PYTHON").unwrap_or_else(|_| DEFAULT_PYTHON.to_string()),
            search_max_results: parse_or_default("SEARCH_MAX_RESULTS", DEFAULT_SEARCH_MAX_RESULTS),
        }
    }

    /// Preferred model first, then the fallback chain, without duplicates.
    pub fn model_candidates(&self) -> Vec<String> {
        let mut candidates = vec![self.model.clone()];
        candidates.extend(FALLBACK_MODELS.iter().map(|m| m.to_string()));
        dedup_candidates(candidates)
    }
}

/// Pick the preferred model from a raw `MODEL` value.
pub fn resolve_model_override(raw: Option<&str>) -> String {
    match raw {
        None => {
            debug!("MODEL not set; using default {}", DEFAULT_MODEL);
            DEFAULT_MODEL.to_string()
        }
        Some(name) if looks_like_model_name(name) => {
            info!(model = %name, "Using MODEL from environment");
            name.to_string()
        }
        Some(name) => {
            warn!(
                "Ignoring MODEL={:?}: does not look like a model name. Using {}",
                name, DEFAULT_MODEL
            );
            DEFAULT_MODEL.to_string()
        }
    }
}

/// Heuristic check that a string can name a served model (e.g. `qwen3:8b`).
///
/// A colon marks a model tag, which lets names like `org/model:tag` through,
/// but a tagged name may not contain spaces.
pub fn looks_like_model_name(name: &str) -> bool {
    if name.is_empty() || name.chars().all(|c| c.is_ascii_digit()) {
        return false;
    }

    let has_colon = name.contains(':');
    if !has_colon && name.contains(&['/', '\\', ' '][..]) {
        return false;
    }
    if has_colon && name.contains(' ') {
        return false;
    }

    if name.contains(SUSPICIOUS_CHARS) {
        return false;
    }

    name.chars().any(char::is_alphabetic)
}

/// Drop empty entries and repeats, keeping first-seen order.
pub fn dedup_candidates<I, S>(candidates: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut seen: Vec<String> = Vec::new();
    for candidate in candidates {
        let candidate = candidate.into();
        if candidate.is_empty() || seen.contains(&candidate) {
            continue;
        }
        seen.push(candidate);
    }
    seen
}

fn normalize_host(host: &str) -> String {
    let host = host.trim().trim_end_matches('/');
    if host.starts_with("http://") || host.starts_with("https://") {
        host.to_string()
    } else {
        format!("http://{}", host)
    }
}

fn parse_or_default<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr + Copy + std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => match raw.trim().parse::<T>() {
            Ok(value) => value,
            Err(_) => {
                warn!("Ignoring {}={:?}: not a valid number, using {}", key, raw, default);
                default
            }
        },
        Err(_) => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_names_rejected() {
        assert!(!looks_like_model_name("5450"));
        assert!(!looks_like_model_name(""));
    }

    #[test]
    fn test_paths_and_spaces_without_colon_rejected() {
        assert!(!looks_like_model_name("models/llama"));
        assert!(!looks_like_model_name("some\\model"));
        assert!(!looks_like_model_name("my model"));
    }

    #[test]
    fn test_colon_tagged_names() {
        assert!(looks_like_model_name("qwen3:8b"));
        assert!(looks_like_model_name("MFDoom/deepseek-r1-tool-calling:8b"));
        assert!(!looks_like_model_name("qwen3:8b latest"));
    }

    #[test]
    fn test_suspicious_characters_rejected() {
        for name in ["$MODEL", "llama%3", "me@host", "model#1", "qwen:8b#x"] {
            assert!(!looks_like_model_name(name), "{} should be rejected", name);
        }
    }

    #[test]
    fn test_plain_names_accepted() {
        assert!(looks_like_model_name("qwen2.5"));
        assert!(looks_like_model_name("llama3.1:8b"));
        assert!(!looks_like_model_name("3.1:8"));
    }

    #[test]
    fn test_resolve_model_override() {
        assert_eq!(resolve_model_override(None), DEFAULT_MODEL);
        assert_eq!(resolve_model_override(Some("5450")), DEFAULT_MODEL);
        assert_eq!(resolve_model_override(Some("mistral:7b")), "mistral:7b");
    }

    #[test]
    fn test_candidates_deduplicated_in_order() {
        let config = AgentConfig {
            model: "qwen2.5".to_string(),
            ..AgentConfig::default()
        };
        assert_eq!(
            config.model_candidates(),
            vec!["qwen2.5", "qwen3:8b", "deepseek-r1:8b", "llama3.1:8b"]
        );

        let default = AgentConfig::default();
        assert_eq!(default.model_candidates()[0], DEFAULT_MODEL);
        assert_eq!(default.model_candidates().len(), FALLBACK_MODELS.len());
    }

    #[test]
    fn test_dedup_drops_empty() {
        assert_eq!(dedup_candidates(["", "a", "b", "a", ""]), vec!["a", "b"]);
    }

    #[test]
    fn test_normalize_host() {
        assert_eq!(normalize_host("127.0.0.1:11434"), "http://127.0.0.1:11434");
        assert_eq!(normalize_host("https://ollama.local/"), "https://ollama.local");
    }
}
