//! Output channels for StreamBot.
//!
//! - **Renderer** — drains a request's frames onto any [`MessageSink`]
//!   with create-then-edit semantics
//! - **CLI** — terminal sink and stdin prompt reader
//!
//! [`MessageSink`]: streambot_core::channel::MessageSink

pub mod cli;
pub mod renderer;

pub use cli::{CliSink, spawn_stdin_reader};
pub use renderer::{EMPTY_ANSWER_PLACEHOLDER, RenderStats, render_frames};
