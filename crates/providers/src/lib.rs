//! LLM Provider implementations for StreamBot.
//!
//! All providers implement the `streambot_core::Provider` trait.
//! The router builds the configured provider.

pub mod openai_compat;
pub mod router;

pub use openai_compat::OpenAiCompatProvider;
pub use router::{ProviderRouter, build_from_config};
