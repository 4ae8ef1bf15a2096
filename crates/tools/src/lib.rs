//! Built-in tool implementations for StreamBot.
//!
//! Tools give the model a way to reach outside the conversation:
//! read the clock and fetch web pages.

pub mod current_time;
pub mod http_get;

use std::sync::Arc;
use streambot_core::tool::ToolRegistry;

pub use current_time::CurrentTimeTool;
pub use http_get::HttpGetTool;

/// Create a tool registry with all built-in tools.
pub fn default_registry() -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(Arc::new(CurrentTimeTool));
    registry.register(Arc::new(HttpGetTool::new()));
    registry
}
