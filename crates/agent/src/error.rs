//! Errors that end a request.

use streambot_core::error::{ProviderError, ToolError};

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Failed to open completion stream: {0}")]
    StreamOpen(#[source] ProviderError),

    #[error("Completion stream failed: {0}")]
    StreamRead(#[source] ProviderError),

    #[error("Tool '{tool}' is not available (call {call_id}): {source}")]
    ToolResolution {
        tool: String,
        call_id: String,
        #[source]
        source: ToolError,
    },

    #[error("Tool '{tool}' failed (call {call_id}): {source}")]
    ToolExecution {
        tool: String,
        call_id: String,
        #[source]
        source: ToolError,
    },

    #[error("Request exceeded its {timeout_secs}s deadline")]
    Timeout { timeout_secs: u64 },

    #[error("User {user_id} already has the maximum number of requests in flight")]
    TooManyRequests { user_id: String },

    #[error("Request task ended abnormally: {0}")]
    TaskFailed(String),
}
