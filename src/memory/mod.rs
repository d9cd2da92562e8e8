//! Conversation memory
//!
//! Per-handler context windows and transcript rendering.

pub mod context_manager;
pub mod store;

pub use context_manager::{estimate_tokens, ContextConfig, ContextTrimmer};
pub use store::{format_transcript, latest_user_message};
