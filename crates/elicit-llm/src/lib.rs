//! Elicit LLM - provider-agnostic completion clients

pub mod anthropic;
pub mod client;
pub mod types;

pub use anthropic::AnthropicClient;
pub use client::{LlmClient, LlmClients, LlmError, LlmResult};
pub use types::{LlmRequest, LlmResponse};
