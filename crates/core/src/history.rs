//! History store trait — the durable per-user turn log.
//!
//! Each completed top-level request is persisted as exactly one
//! [`ConversationTurn`]. The context builder reads recent turns back to
//! give the model conversational memory.

use crate::error::HistoryError;
use crate::message::Message;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One persisted question/answer exchange.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationTurn {
    /// Owner of the turn (platform-specific user id)
    pub user_id: String,

    /// The prompt that started the request
    pub question: String,

    /// The final answer text shown to the user
    pub answer: String,

    /// JSON array of the assistant tool-call and tool-result messages
    /// exchanged while answering. Empty when no tool was used.
    #[serde(default)]
    pub tool_messages: String,

    /// Total tokens consumed across all continuations
    pub token_count: u64,

    /// Whether the request completed (as opposed to being cut short)
    pub is_final: bool,

    /// When the turn was written
    pub created_at: DateTime<Utc>,
}

impl ConversationTurn {
    /// A turn is usable as context only when both sides are present.
    pub fn is_answered(&self) -> bool {
        !self.question.is_empty() && !self.answer.is_empty()
    }

    /// Decode `tool_messages` back into messages.
    ///
    /// Returns an empty list when no tool messages were recorded.
    pub fn decode_tool_messages(&self) -> Result<Vec<Message>, serde_json::Error> {
        if self.tool_messages.trim().is_empty() {
            return Ok(Vec::new());
        }
        serde_json::from_str(&self.tool_messages)
    }

    /// Serialize tool messages for storage (empty string for none).
    pub fn encode_tool_messages(messages: &[Message]) -> Result<String, serde_json::Error> {
        if messages.is_empty() {
            return Ok(String::new());
        }
        serde_json::to_string(messages)
    }
}

/// The core HistoryStore trait.
///
/// Implementations: in-memory (tests, ephemeral sessions) and SQLite.
/// Shared across request tasks; each request only reads and writes its own
/// user's turns, so no request-level locking is required.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// The backend name (e.g., "sqlite", "memory").
    fn name(&self) -> &str;

    /// Fetch up to `limit` of the user's most recent turns, oldest first.
    async fn fetch_recent(&self, user_id: &str, limit: usize) -> Result<Vec<ConversationTurn>, HistoryError>;

    /// Append a completed turn.
    async fn append(&self, turn: ConversationTurn) -> Result<(), HistoryError>;
}
