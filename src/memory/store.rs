//! Conversation log
//!
//! Append-only record of the session. The first entry is always the system
//! prompt; the whole log is sent to the model on every chat call.

use crate::models::{Message, Role};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct ConversationLog {
    pub session_id: Uuid,
    messages: Vec<Message>,
}

impl ConversationLog {
    /// Start a log seeded with the system prompt.
    pub fn new(system_prompt: impl Into<String>) -> Self {
        Self {
            session_id: Uuid::new_v4(),
            messages: vec![Message::system(system_prompt)],
        }
    }

    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    // =============================
    // Accessors
    // =============================

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Number of messages with the given role
    pub fn count_role(&self, role: Role) -> usize {
        self.messages.iter().filter(|m| m.role == role).count()
    }
}
