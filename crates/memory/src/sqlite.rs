//! SQLite history store.
//!
//! One table, `turns`, holding one row per completed request. The integer
//! primary key gives insertion order, which is what "most recent" means.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Row, SqlitePool};
use std::path::Path;
use std::str::FromStr;
use streambot_core::error::HistoryError;
use streambot_core::history::{ConversationTurn, HistoryStore};
use tracing::{debug, info};

/// A durable SQLite-backed history store.
pub struct SqliteHistory {
    pool: SqlitePool,
}

impl SqliteHistory {
    /// Open (or create) the database file at `path`.
    pub async fn open(path: &Path) -> Result<Self, HistoryError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| HistoryError::Storage(format!("Failed to create {}: {e}", parent.display())))?;
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal);

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await
            .map_err(|e| HistoryError::Storage(format!("Failed to open SQLite: {e}")))?;

        let store = Self { pool };
        store.run_migrations().await?;
        info!("SQLite history store initialized at {}", path.display());
        Ok(store)
    }

    /// An ephemeral in-process database.
    ///
    /// Every `:memory:` connection is a separate database, so the pool is
    /// held to a single connection.
    pub async fn in_memory() -> Result<Self, HistoryError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .map_err(|e| HistoryError::Storage(format!("Invalid SQLite URL: {e}")))?;

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .map_err(|e| HistoryError::Storage(format!("Failed to open SQLite: {e}")))?;

        Self::from_pool(pool).await
    }

    /// Create from an existing pool.
    pub async fn from_pool(pool: SqlitePool) -> Result<Self, HistoryError> {
        let store = Self { pool };
        store.run_migrations().await?;
        Ok(store)
    }

    async fn run_migrations(&self) -> Result<(), HistoryError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS turns (
                id             INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id        TEXT NOT NULL,
                question       TEXT NOT NULL,
                answer         TEXT NOT NULL,
                tool_messages  TEXT NOT NULL DEFAULT '',
                token_count    INTEGER NOT NULL DEFAULT 0,
                is_final       INTEGER NOT NULL DEFAULT 1,
                created_at     TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| HistoryError::MigrationFailed(format!("turns table: {e}")))?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_turns_user ON turns(user_id, id DESC)")
            .execute(&self.pool)
            .await
            .map_err(|e| HistoryError::MigrationFailed(format!("user index: {e}")))?;

        debug!("SQLite migrations complete");
        Ok(())
    }

    /// Parse a `ConversationTurn` from a SQLite row.
    fn row_to_turn(row: &sqlx::sqlite::SqliteRow) -> Result<ConversationTurn, HistoryError> {
        let column = |name: &str, e: sqlx::Error| HistoryError::QueryFailed(format!("{name} column: {e}"));

        let user_id: String = row.try_get("user_id").map_err(|e| column("user_id", e))?;
        let question: String = row.try_get("question").map_err(|e| column("question", e))?;
        let answer: String = row.try_get("answer").map_err(|e| column("answer", e))?;
        let tool_messages: String = row
            .try_get("tool_messages")
            .map_err(|e| column("tool_messages", e))?;
        let token_count: i64 = row.try_get("token_count").map_err(|e| column("token_count", e))?;
        let is_final: bool = row.try_get("is_final").map_err(|e| column("is_final", e))?;
        let created_at_str: String = row.try_get("created_at").map_err(|e| column("created_at", e))?;

        let created_at = chrono::DateTime::parse_from_rfc3339(&created_at_str)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now());

        Ok(ConversationTurn {
            user_id,
            question,
            answer,
            tool_messages,
            token_count: u64::try_from(token_count).unwrap_or(0),
            is_final,
            created_at,
        })
    }
}

#[async_trait]
impl HistoryStore for SqliteHistory {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn fetch_recent(&self, user_id: &str, limit: usize) -> Result<Vec<ConversationTurn>, HistoryError> {
        let rows = sqlx::query(
            r#"
            SELECT user_id, question, answer, tool_messages, token_count, is_final, created_at
            FROM turns
            WHERE user_id = ?1
            ORDER BY id DESC
            LIMIT ?2
            "#,
        )
        .bind(user_id)
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| HistoryError::QueryFailed(format!("fetch_recent: {e}")))?;

        let mut turns = rows.iter().map(Self::row_to_turn).collect::<Result<Vec<_>, _>>()?;
        turns.reverse();
        Ok(turns)
    }

    async fn append(&self, turn: ConversationTurn) -> Result<(), HistoryError> {
        sqlx::query(
            r#"
            INSERT INTO turns (user_id, question, answer, tool_messages, token_count, is_final, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(&turn.user_id)
        .bind(&turn.question)
        .bind(&turn.answer)
        .bind(&turn.tool_messages)
        .bind(i64::try_from(turn.token_count).unwrap_or(i64::MAX))
        .bind(turn.is_final)
        .bind(turn.created_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| HistoryError::Storage(format!("INSERT failed: {e}")))?;

        debug!(user_id = %turn.user_id, tokens = turn.token_count, "Stored conversation turn");
        Ok(())
    }
}
