//! LLM client for SQL generation and repair
//!
//! Talks to any OpenAI-compatible `/chat/completions` endpoint, including the
//! model API served by `xiyan-http`.

mod ai_types;
mod client;
pub mod error;

#[cfg(test)]
mod retry_tests;

pub use ai_types::{
    ChatCompletionResponse, ChatMessage, ChatRequest, Choice, ResponseMessage, Role, Usage,
};
pub use client::{ChatModel, LlmClient, truncate};
pub use error::LlmError;
