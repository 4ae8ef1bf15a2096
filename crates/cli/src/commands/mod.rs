//! Subcommand implementations.

pub mod chat;
pub mod history;
pub mod init;

use std::sync::Arc;
use streambot_config::AppConfig;
use streambot_core::history::HistoryStore;
use streambot_memory::{InMemoryHistory, SqliteHistory};

/// Open the history store named in the config.
pub async fn open_history(config: &AppConfig) -> Result<Arc<dyn HistoryStore>, Box<dyn std::error::Error>> {
    match config.history.backend.as_str() {
        "memory" => Ok(Arc::new(InMemoryHistory::new())),
        "sqlite" => {
            let path = config.history.resolved_path();
            Ok(Arc::new(SqliteHistory::open(&path).await?))
        }
        other => Err(format!("Unknown history backend '{other}'").into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_backend_opens() {
        let mut config = AppConfig::default();
        config.history.backend = "memory".into();
        let store = open_history(&config).await.unwrap();
        assert_eq!(store.name(), "memory");
    }

    #[tokio::test]
    async fn sqlite_backend_opens_at_configured_path() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = AppConfig::default();
        config.history.path = Some(dir.path().join("nested").join("history.db"));
        let store = open_history(&config).await.unwrap();
        assert_eq!(store.name(), "sqlite");
        assert!(dir.path().join("nested").join("history.db").exists());
    }

    #[tokio::test]
    async fn unknown_backend_is_rejected() {
        let mut config = AppConfig::default();
        config.history.backend = "redis".into();
        assert!(open_history(&config).await.is_err());
    }
}
