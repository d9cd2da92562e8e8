//! Financial assistant router
//!
//! Routes each user question to one or more specialized handlers:
//! - a deterministic fast router answers confident cases directly
//! - an LLM supervisor decides the rest, with a keyword fallback
//! - a state-machine dispatcher runs the chosen handlers in order
//! - each handler sees a trimmed window of the conversation
//! - multi-handler answers are merged into one reply
//!
//! FLOW:
//! QUESTION → FAST ROUTE → SUPERVISE? → HANDLER(S) → SYNTHESIZE? → ANSWER

pub mod agent;
pub mod api;
pub mod config;
pub mod error;
pub mod execution;
pub mod gemini;
pub mod generation;
pub mod goals;
pub mod handlers;
pub mod memory;
pub mod metrics;
pub mod models;
pub mod router;
pub mod state;
pub mod supervisor;
pub mod synthesis;

pub use error::Result;

// Re-export common types
pub use models::*;
pub use router::FastRouter;
