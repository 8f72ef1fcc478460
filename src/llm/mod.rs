//! LLM provider seam.
//!
//! The core only calls an LLM for cover-letter generation, the optional
//! confidence judgement, and optional CV enrichment; all of these are
//! non-critical and have explicit fallbacks, so the trait stays narrow.

mod client;
mod types;

#[cfg(test)]
pub(crate) use client::testing;
pub use client::{ClientConfig, HttpChatClient, LlmClient, NullLlm};
pub use types::{ChatMessage, ChatRole, CompletionRequest, CompletionResponse};
