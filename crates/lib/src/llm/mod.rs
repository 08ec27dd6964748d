//! Completion API client.
//!
//! Wraps the hosted Messages endpoint: build a bounded prompt elsewhere, send it here,
//! get back the first text block.

mod anthropic;

pub use anthropic::{AnthropicClient, ChatMessage, CompletionError, CompletionRequest};
