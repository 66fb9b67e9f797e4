//! Ollama Tool Agent
//!
//! An interactive agent that lets a local language model answer directly or
//! delegate to a small set of tools:
//! - Web and finance-news search, summarized before the user sees it
//! - Python execution in a persistent sandbox, shown verbatim
//! - Startup model resolution with a liveness probe per candidate
//!
//! TURN LOOP:
//! INPUT → DISPATCH → (ANSWER | TOOLS → SUMMARIZE) → INPUT

pub mod agent;
pub mod config;
pub mod console;
pub mod error;
pub mod llm;
pub mod memory;
pub mod models;
pub mod repl;
pub mod resolver;
pub mod router;
pub mod sandbox;
pub mod tools;

pub use error::Result;

// Re-export common types
pub use agent::{ConversationEngine, TurnOutcome};
pub use models::*;
pub use repl::{run_session, SessionEnd};
