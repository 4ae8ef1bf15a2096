//! Shared test helpers: scripted providers, recording tools and sinks.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use streambot_core::error::{HistoryError, ProviderError, ToolError};
use streambot_core::history::{ConversationTurn, HistoryStore};
use streambot_core::provider::{ChunkReceiver, Provider, ProviderRequest, StreamChunk, ToolCallDelta, Usage};
use streambot_core::tool::{Tool, ToolArguments};
use streambot_core::usage::UsageSink;
use tokio::sync::mpsc;

/// What one call to `stream()` should do.
pub enum Script {
    /// Yield these items, then end the stream.
    Chunks(Vec<Result<StreamChunk, ProviderError>>),
    /// Refuse to open the stream.
    OpenError(ProviderError),
    /// Open the stream and never send anything.
    Stall,
}

/// A provider that plays back one [`Script`] per `stream()` call and
/// records every request it receives.
///
/// Panics if more streams are opened than scripts provided.
pub struct ScriptedProvider {
    scripts: Mutex<VecDeque<Script>>,
    requests: Mutex<Vec<ProviderRequest>>,
}

impl ScriptedProvider {
    pub fn new(scripts: Vec<Script>) -> Self {
        Self {
            scripts: Mutex::new(scripts.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// A provider whose only stream yields the given chunks.
    pub fn single(chunks: Vec<StreamChunk>) -> Self {
        Self::new(vec![Script::Chunks(chunks.into_iter().map(Ok).collect())])
    }

    pub fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn stream(&self, request: ProviderRequest) -> Result<ChunkReceiver, ProviderError> {
        self.requests.lock().unwrap().push(request);
        let script = self
            .scripts
            .lock()
            .unwrap()
            .pop_front()
            .expect("ScriptedProvider: no more scripts");

        match script {
            Script::OpenError(e) => Err(e),
            Script::Chunks(items) => {
                let (tx, rx) = mpsc::channel(items.len().max(1));
                for item in items {
                    tx.try_send(item).unwrap();
                }
                Ok(rx)
            }
            Script::Stall => {
                let (tx, rx) = mpsc::channel(1);
                tokio::spawn(async move {
                    let _tx = tx;
                    std::future::pending::<()>().await;
                });
                Ok(rx)
            }
        }
    }
}

/// A tool that logs `name:arguments` to a shared log and answers
/// `"<name> ok"`.
pub struct RecordingTool {
    name: String,
    log: Arc<Mutex<Vec<String>>>,
}

impl RecordingTool {
    pub fn new(name: &str, log: Arc<Mutex<Vec<String>>>) -> Self {
        Self {
            name: name.to_string(),
            log,
        }
    }
}

#[async_trait]
impl Tool for RecordingTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        "Records its invocations"
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({"type": "object"})
    }

    async fn execute(&self, arguments: ToolArguments) -> Result<String, ToolError> {
        let args = serde_json::to_string(&arguments).unwrap();
        self.log.lock().unwrap().push(format!("{}:{}", self.name, args));
        Ok(format!("{} ok", self.name))
    }
}

/// A tool that always fails.
pub struct FailingTool;

#[async_trait]
impl Tool for FailingTool {
    fn name(&self) -> &str {
        "broken"
    }

    fn description(&self) -> &str {
        "Always fails"
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({"type": "object"})
    }

    async fn execute(&self, _arguments: ToolArguments) -> Result<String, ToolError> {
        Err(ToolError::ExecutionFailed {
            tool_name: "broken".into(),
            reason: "it broke".into(),
        })
    }
}

/// A tool that takes far longer than any test deadline.
pub struct SlowTool;

#[async_trait]
impl Tool for SlowTool {
    fn name(&self) -> &str {
        "slow"
    }

    fn description(&self) -> &str {
        "Sleeps for an hour"
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({"type": "object"})
    }

    async fn execute(&self, _arguments: ToolArguments) -> Result<String, ToolError> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Ok("done".into())
    }
}

/// A history store whose every operation fails.
pub struct FailingHistory;

#[async_trait]
impl HistoryStore for FailingHistory {
    fn name(&self) -> &str {
        "failing"
    }

    async fn fetch_recent(&self, _user_id: &str, _limit: usize) -> Result<Vec<ConversationTurn>, HistoryError> {
        Err(HistoryError::QueryFailed("database is locked".into()))
    }

    async fn append(&self, _turn: ConversationTurn) -> Result<(), HistoryError> {
        Err(HistoryError::Storage("disk full".into()))
    }
}

/// A usage sink that remembers what it was told.
#[derive(Default)]
pub struct RecordingUsage {
    pub tokens: AtomicU64,
    pub turns: AtomicU64,
    pub conversations: AtomicU64,
}

impl UsageSink for RecordingUsage {
    fn add_tokens(&self, tokens: u64) {
        self.tokens.fetch_add(tokens, Ordering::SeqCst);
    }

    fn observe_conversation(&self, _duration: Duration) {
        self.conversations.fetch_add(1, Ordering::SeqCst);
    }

    fn record_turn(&self) {
        self.turns.fetch_add(1, Ordering::SeqCst);
    }

    fn record_app_request(&self, _platform: &str) {}
}

/// A tool-call fragment.
pub fn fragment(index: usize, id: Option<&str>, name: Option<&str>, arguments: &str) -> ToolCallDelta {
    ToolCallDelta {
        index,
        id: id.map(str::to_string),
        kind: id.map(|_| "function".to_string()),
        name: name.map(str::to_string),
        arguments: Some(arguments.to_string()),
    }
}

/// A chunk carrying one tool-call fragment.
pub fn tool_chunk(index: usize, id: Option<&str>, name: Option<&str>, arguments: &str) -> StreamChunk {
    StreamChunk::tools(vec![fragment(index, id, name, arguments)])
}

pub fn usage_chunk(total: u32) -> StreamChunk {
    StreamChunk::usage(Usage {
        prompt_tokens: total / 2,
        completion_tokens: total - total / 2,
        total_tokens: total,
    })
}
