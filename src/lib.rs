//! llm-providers
//!
//! A provider-agnostic completion interface over LLM services:
//! - One `LlmProvider` contract for direct and kernel-mediated backends
//! - Error taxonomy with rate-limit, authentication and timeout detection
//! - Exponential backoff on rate limits
//! - A caching `ProviderFactory` keyed by model, credential source and backend

pub mod cli;
pub mod config;
pub mod domain;
pub mod infrastructure;

pub use config::AppConfig;
pub use domain::{
    Backend, CompletionInput, CompletionOptions, ErrorKind, LlmError, LlmProvider, LlmResponse,
    Message, MessageRole, RetryPolicy, Usage,
};
pub use infrastructure::llm::{ProviderConfig, ProviderFactory};
