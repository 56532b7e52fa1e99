//! LLM provider domain models and traits

mod message;
mod provider;
mod request;
mod response;
mod retry;

pub use message::{Message, MessageRole};
pub use provider::{matches_supported, Backend, LlmProvider};
pub use request::{CompletionInput, CompletionOptions, DEFAULT_TEMPERATURE};
pub use response::{LlmResponse, Usage};
pub use retry::RetryPolicy;

#[cfg(test)]
pub use provider::mock::MockLlmProvider;
