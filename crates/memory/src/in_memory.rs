//! In-memory history store — useful for testing and ephemeral sessions.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use streambot_core::error::HistoryError;
use streambot_core::history::{ConversationTurn, HistoryStore};
use tokio::sync::RwLock;

/// Keeps every user's turns in insertion order.
/// Nothing survives a restart.
#[derive(Clone, Default)]
pub struct InMemoryHistory {
    turns: Arc<RwLock<HashMap<String, Vec<ConversationTurn>>>>,
}

impl InMemoryHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of stored turns across all users.
    pub async fn len(&self) -> usize {
        self.turns.read().await.values().map(Vec::len).sum()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl HistoryStore for InMemoryHistory {
    fn name(&self) -> &str {
        "memory"
    }

    async fn fetch_recent(&self, user_id: &str, limit: usize) -> Result<Vec<ConversationTurn>, HistoryError> {
        let turns = self.turns.read().await;
        let Some(user_turns) = turns.get(user_id) else {
            return Ok(Vec::new());
        };
        let start = user_turns.len().saturating_sub(limit);
        Ok(user_turns[start..].to_vec())
    }

    async fn append(&self, turn: ConversationTurn) -> Result<(), HistoryError> {
        self.turns
            .write()
            .await
            .entry(turn.user_id.clone())
            .or_default()
            .push(turn);
        Ok(())
    }
}
