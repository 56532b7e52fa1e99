//! Domain layer - Provider contract, message model and error taxonomy

pub mod error;
pub mod llm;
pub mod prompt;

pub use error::{classify, BackendError, ErrorKind, LlmError};
pub use llm::{
    matches_supported, Backend, CompletionInput, CompletionOptions, LlmProvider, LlmResponse,
    Message, MessageRole, RetryPolicy, Usage,
};
pub use prompt::{PromptTemplate, TemplateError, TemplateState};
