//! Model resolution
//!
//! Walks the candidate list and settles on the first model that answers a
//! liveness probe. Each probe is a two-tier chain: a blocking generation
//! first, then a streaming one that only waits for the first chunk.

use crate::config::dedup_candidates;
use crate::console::Console;
use crate::llm::{ModelBackend, StreamStart};
use crate::models::ModelHandle;
use std::sync::Arc;
use tracing::{info, warn};

const PROBE_PROMPT: &str = "Hello";

/// Which probe tier proved the model live
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeTier {
    Blocking,
    Streaming,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    Live(ProbeTier),
    Unavailable {
        blocking_error: String,
        streaming_error: String,
    },
}

impl ProbeOutcome {
    pub fn is_live(&self) -> bool {
        matches!(self, ProbeOutcome::Live(_))
    }
}

/// Record of one probed candidate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeAttempt {
    pub model: String,
    pub outcome: ProbeOutcome,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Resolved {
        model: ModelHandle,
        tier: ProbeTier,
        attempts: Vec<ProbeAttempt>,
    },
    Unavailable {
        attempts: Vec<ProbeAttempt>,
    },
}

pub struct ModelResolver {
    backend: Arc<dyn ModelBackend>,
}

impl ModelResolver {
    pub fn new(backend: Arc<dyn ModelBackend>) -> Self {
        Self { backend }
    }

    /// Probe a single model.
    pub async fn probe(&self, model: &str) -> ProbeOutcome {
        let blocking_error = match self.backend.generate(model, PROBE_PROMPT).await {
            Ok(_) => {
                info!(model, "Probe (blocking) OK");
                return ProbeOutcome::Live(ProbeTier::Blocking);
            }
            Err(e) => {
                warn!(model, error = %e, "Probe (blocking) failed");
                e.to_string()
            }
        };

        let streaming_error = match self.backend.generate_stream_start(model, PROBE_PROMPT).await {
            Ok(StreamStart::FirstChunk(_)) => {
                info!(model, "Probe (stream) OK, first chunk received");
                return ProbeOutcome::Live(ProbeTier::Streaming);
            }
            Ok(StreamStart::Complete { response }) if !response.is_empty() => {
                info!(model, "Probe (stream) OK, complete response received");
                return ProbeOutcome::Live(ProbeTier::Streaming);
            }
            Ok(StreamStart::Complete { .. }) => {
                warn!(model, "Probe (stream) returned an empty response");
                "empty response".to_string()
            }
            Err(e) => {
                warn!(model, error = %e, "Probe (stream) failed");
                e.to_string()
            }
        };

        ProbeOutcome::Unavailable {
            blocking_error,
            streaming_error,
        }
    }

    /// Return the first live candidate, probing in order and stopping there.
    pub async fn resolve<I, S>(&self, candidates: I, console: &dyn Console) -> Resolution
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut attempts = Vec::new();

        for model in dedup_candidates(candidates) {
            console.print(&format!("[checking model] {} ...", model));
            let outcome = self.probe(&model).await;

            if let ProbeOutcome::Live(tier) = outcome {
                console.print(&format!("[checking model] {} OK", model));
                attempts.push(ProbeAttempt {
                    model: model.clone(),
                    outcome,
                });
                return Resolution::Resolved {
                    model: ModelHandle::new(model),
                    tier,
                    attempts,
                };
            }

            console.print(&format!("[checking model] {} unavailable", model));
            attempts.push(ProbeAttempt { model, outcome });
        }

        Resolution::Unavailable { attempts }
    }
}

/// Operator guidance shown when no usable model exists.
pub fn model_help(model: &str) -> String {
    format!(
        "\n[ERROR] No usable model found among the candidates (preferred: {model}).\n\
         Suggestions:\n\
         \x20 - Run `ollama list` to see the models available on this host.\n\
         \x20 - Pull the model you want to use: `ollama pull {model}`\n\
         \x20 - Or export a different MODEL before starting (e.g. MODEL=qwen3:8b).\n"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::console::RecordingConsole;
    use crate::error::AgentError;
    use crate::llm::{ChatReply, ChatRequest};
    use crate::Result;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Clone, Copy)]
    enum Behaviour {
        Live,
        StreamOnly,
        CompleteEmpty,
        CompleteText,
        Dead,
    }

    struct ProbeBackend {
        behaviour: HashMap<String, Behaviour>,
        probes: Mutex<Vec<String>>,
    }

    impl ProbeBackend {
        fn new(entries: &[(&str, Behaviour)]) -> Self {
            Self {
                behaviour: entries.iter().map(|(m, b)| (m.to_string(), *b)).collect(),
                probes: Mutex::new(Vec::new()),
            }
        }

        fn lookup(&self, model: &str) -> Behaviour {
            self.behaviour.get(model).copied().unwrap_or(Behaviour::Dead)
        }

        fn probed(&self) -> Vec<String> {
            self.probes.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ModelBackend for ProbeBackend {
        async fn generate(&self, model: &str, _prompt: &str) -> Result<String> {
            self.probes.lock().unwrap().push(model.to_string());
            match self.lookup(model) {
                Behaviour::Live => Ok("hi".to_string()),
                _ => Err(AgentError::LlmError("boom".to_string())),
            }
        }

        async fn generate_stream_start(&self, model: &str, _prompt: &str) -> Result<StreamStart> {
            match self.lookup(model) {
                Behaviour::StreamOnly => Ok(StreamStart::FirstChunk("H".to_string())),
                Behaviour::CompleteEmpty => Ok(StreamStart::Complete {
                    response: String::new(),
                }),
                Behaviour::CompleteText => Ok(StreamStart::Complete {
                    response: "Hello!".to_string(),
                }),
                _ => Err(AgentError::ModelUnavailable(format!("model {} not found", model))),
            }
        }

        async fn chat(&self, _request: ChatRequest<'_>) -> Result<ChatReply> {
            unreachable!("resolver never chats")
        }
    }

    #[tokio::test]
    async fn test_first_live_candidate_wins() {
        let backend = Arc::new(ProbeBackend::new(&[
            ("b", Behaviour::Live),
            ("c", Behaviour::Live),
        ]));
        let resolver = ModelResolver::new(backend.clone());
        let console = RecordingConsole::new();

        let resolution = resolver.resolve(["a", "b", "c"], &console).await;
        match resolution {
            Resolution::Resolved { model, tier, attempts } => {
                assert_eq!(model.as_str(), "b");
                assert_eq!(tier, ProbeTier::Blocking);
                assert_eq!(attempts.len(), 2);
                assert!(!attempts[0].outcome.is_live());
            }
            other => panic!("unexpected resolution: {:?}", other),
        }
        assert_eq!(backend.probed(), vec!["a", "b"]);
        assert_eq!(
            console.lines(),
            vec![
                "[checking model] a ...",
                "[checking model] a unavailable",
                "[checking model] b ...",
                "[checking model] b OK",
            ]
        );
    }

    #[tokio::test]
    async fn test_duplicates_probed_once() {
        let backend = Arc::new(ProbeBackend::new(&[("z", Behaviour::Live)]));
        let resolver = ModelResolver::new(backend.clone());

        let resolution = resolver.resolve(["a", "", "a", "z", "a"], &RecordingConsole::new()).await;
        assert!(matches!(resolution, Resolution::Resolved { .. }));
        assert_eq!(backend.probed(), vec!["a", "z"]);
    }

    #[tokio::test]
    async fn test_streaming_tier_rescues_candidate() {
        let backend = Arc::new(ProbeBackend::new(&[
            ("stream", Behaviour::StreamOnly),
            ("whole", Behaviour::CompleteText),
        ]));
        let resolver = ModelResolver::new(backend);

        assert_eq!(resolver.probe("stream").await, ProbeOutcome::Live(ProbeTier::Streaming));
        assert_eq!(resolver.probe("whole").await, ProbeOutcome::Live(ProbeTier::Streaming));
    }

    #[tokio::test]
    async fn test_empty_complete_response_is_not_live() {
        let backend = Arc::new(ProbeBackend::new(&[("empty", Behaviour::CompleteEmpty)]));
        let resolver = ModelResolver::new(backend);

        match resolver.probe("empty").await {
            ProbeOutcome::Unavailable { streaming_error, .. } => {
                assert_eq!(streaming_error, "empty response");
            }
            other => panic!("expected unavailable, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_no_live_candidate() {
        let backend = Arc::new(ProbeBackend::new(&[]));
        let resolver = ModelResolver::new(backend);

        match resolver.resolve(["a", "b"], &RecordingConsole::new()).await {
            Resolution::Unavailable { attempts } => {
                assert_eq!(attempts.len(), 2);
                match &attempts[1].outcome {
                    ProbeOutcome::Unavailable {
                        blocking_error,
                        streaming_error,
                    } => {
                        assert!(blocking_error.contains("boom"));
                        assert!(streaming_error.contains("not found"));
                    }
                    other => panic!("unexpected outcome: {:?}", other),
                }
            }
            other => panic!("unexpected resolution: {:?}", other),
        }
    }

    #[test]
    fn test_model_help_mentions_commands() {
        let help = model_help("qwen3:8b");
        assert!(help.contains("ollama list"));
        assert!(help.contains("ollama pull qwen3:8b"));
    }
}
