//! Client for the external generation endpoint.
//!
//! Speaks the OpenAI-compatible chat completions protocol and returns the
//! generated text verbatim.

mod ai_types;
mod client;
mod error;
mod generation;

#[cfg(test)]
mod retry_tests;

pub use client::{truncate, LlmClient, DEFAULT_MODEL, MAX_SOURCE_DATA_LEN};
pub use error::LlmError;
pub use generation::{FollowUpPrompt, PriorTurn};
