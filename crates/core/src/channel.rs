//! MessageSink trait — the abstraction over chat platforms.
//!
//! A sink is the output side of a platform adapter (Telegram, Discord,
//! CLI, ...). Streaming answers are shown by creating a message once and
//! then editing it in place as more text arrives.

use crate::error::ChannelError;
use async_trait::async_trait;

/// The core MessageSink trait.
///
/// Implementations handle platform-specific formatting and rate limits.
#[async_trait]
pub trait MessageSink: Send + Sync {
    /// Human-readable platform name (e.g., "telegram", "cli").
    fn name(&self) -> &str;

    /// Post a new message, returning the platform's id for it.
    async fn create(&self, content: &str) -> std::result::Result<String, ChannelError>;

    /// Replace the content of a previously created message.
    async fn edit(&self, message_id: &str, content: &str) -> std::result::Result<(), ChannelError>;

    /// Send a typing indicator (if the platform supports it).
    async fn send_typing(&self) -> std::result::Result<(), ChannelError> {
        Ok(()) // No-op default
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct VecSink {
        messages: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl MessageSink for VecSink {
        fn name(&self) -> &str {
            "vec"
        }

        async fn create(&self, content: &str) -> std::result::Result<String, ChannelError> {
            let mut messages = self.messages.lock().unwrap();
            messages.push(content.to_string());
            Ok((messages.len() - 1).to_string())
        }

        async fn edit(&self, message_id: &str, content: &str) -> std::result::Result<(), ChannelError> {
            let idx: usize = message_id.parse().map_err(|_| ChannelError::EditFailed {
                channel: "vec".into(),
                message_id: message_id.into(),
                reason: "bad id".into(),
            })?;
            self.messages.lock().unwrap()[idx] = content.to_string();
            Ok(())
        }
    }

    #[tokio::test]
    async fn create_then_edit() {
        let sink = VecSink::default();
        let id = sink.create("hel").await.unwrap();
        sink.edit(&id, "hello").await.unwrap();
        sink.send_typing().await.unwrap();
        assert_eq!(*sink.messages.lock().unwrap(), vec!["hello".to_string()]);
        assert!(sink.edit("nope", "x").await.is_err());
    }
}
