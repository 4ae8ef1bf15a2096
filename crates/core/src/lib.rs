//! # StreamBot Core
//!
//! Domain types, traits, and error definitions for the StreamBot engine.
//! This crate has **no framework dependencies** beyond serde and tokio's
//! channel types. It defines the domain model that every other crate
//! implements against.
//!
//! ## Design Philosophy
//!
//! Every external collaborator of the engine is a trait here:
//! - [`Provider`] streams completions from an LLM backend
//! - [`HistoryStore`] reads and appends per-user conversation turns
//! - [`Tool`] executes one named capability (collected in a [`ToolRegistry`])
//! - [`MessageSink`] renders frames on a chat platform
//! - [`UsageSink`] receives fire-and-forget usage metrics
//!
//! Implementations live in their respective crates, which keeps the
//! dependency graph pointing inward and makes every seam mockable.

pub mod channel;
pub mod error;
pub mod frame;
pub mod history;
pub mod message;
pub mod provider;
pub mod tool;
pub mod usage;

// Re-export key types at crate root for ergonomics
pub use channel::MessageSink;
pub use error::{ChannelError, HistoryError, ProviderError, ToolError};
pub use frame::OutboundFrame;
pub use history::{ConversationTurn, HistoryStore};
pub use message::{Message, Role, ToolCall};
pub use provider::{Provider, ProviderRequest, StreamChunk, ToolCallDelta, Usage};
pub use tool::{Tool, ToolRegistry};
pub use usage::{NoopUsageSink, UsageSink};
