//! The StreamBot request engine.
//!
//! A request moves through these stages:
//!
//! 1. **Build context** from the user's recent history plus the new prompt
//! 2. **Stream** a completion from the provider
//! 3. **Route deltas**: text goes to the output chunker, tool-call
//!    fragments go to the accumulator, which dispatches each call as soon
//!    as its arguments are complete
//! 4. **Continue** with the tool results appended if any call ran, else
//! 5. **Finalize**: flush the last frame and persist one turn
//!
//! Every request runs in its own task. The caller gets a frame receiver
//! and a join handle; see [`Engine::run_request`].

pub mod accumulator;
pub mod chunker;
pub mod context;
pub mod engine;
pub mod error;
pub mod limiter;
pub mod session;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use accumulator::{DispatchOutcome, ToolCallAccumulator};
pub use chunker::{ChunkerSettings, OutputChunker};
pub use context::build_context;
pub use engine::{Engine, EngineSettings, RequestHandle, RequestSummary};
pub use error::EngineError;
pub use limiter::{ChatPermit, UserChatLimiter};
pub use session::{Deadline, RequestSession};
