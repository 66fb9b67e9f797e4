//! Agent Memory
//!
//! Holds the session's conversation log. Nothing is trimmed or summarized;
//! the log only grows.

pub mod store;

pub use store::ConversationLog;
