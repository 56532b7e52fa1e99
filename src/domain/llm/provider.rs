use std::fmt::{self, Debug};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{CompletionInput, CompletionOptions, LlmResponse};
use crate::domain::LlmError;

/// How a provider reaches the model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Backend {
    /// Calls the model-hosting API directly
    Direct,
    /// Mediates the call through a kernel with a registered chat service
    Kernel,
}

impl Backend {
    pub fn from_flag(use_kernel: bool) -> Self {
        if use_kernel { Self::Kernel } else { Self::Direct }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Direct => "direct",
            Self::Kernel => "kernel",
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// True if `model` equals a supported identifier or extends one, as dated
/// snapshots like `gpt-4o-2024-08-06` do.
///
/// Prefix matching is loose: any name that merely starts with a supported
/// identifier is accepted.
pub fn matches_supported(supported: &[&str], model: &str) -> bool {
    supported
        .iter()
        .any(|known| model == *known || model.starts_with(*known))
}

/// Completion backend (direct HTTP API, kernel-mediated, ...)
#[async_trait]
pub trait LlmProvider: Send + Sync + Debug {
    /// Run a chat completion, retrying rate-limited calls
    async fn complete(
        &self,
        input: CompletionInput,
        options: CompletionOptions,
    ) -> Result<LlmResponse, LlmError>;

    /// Default model used for completions
    fn model(&self) -> &str;

    fn backend(&self) -> Backend;

    fn provider_name(&self) -> &'static str;

    /// Known model identifiers served by this provider
    fn supported_models(&self) -> &'static [&'static str];

    fn supports_model(&self, model: &str) -> bool {
        matches_supported(self.supported_models(), model)
    }
}

#[cfg(test)]
pub mod mock {
    use super::*;

    #[derive(Debug)]
    pub struct MockLlmProvider {
        model: String,
        backend: Backend,
        response: Option<LlmResponse>,
        error: Option<LlmError>,
    }

    impl MockLlmProvider {
        pub fn new(model: impl Into<String>) -> Self {
            Self {
                model: model.into(),
                backend: Backend::Direct,
                response: None,
                error: None,
            }
        }

        pub fn with_backend(mut self, backend: Backend) -> Self {
            self.backend = backend;
            self
        }

        pub fn with_response(mut self, response: LlmResponse) -> Self {
            self.response = Some(response);
            self
        }

        pub fn with_error(mut self, error: LlmError) -> Self {
            self.error = Some(error);
            self
        }
    }

    #[async_trait]
    impl LlmProvider for MockLlmProvider {
        async fn complete(
            &self,
            _input: CompletionInput,
            _options: CompletionOptions,
        ) -> Result<LlmResponse, LlmError> {
            if let Some(ref error) = self.error {
                return Err(error.clone());
            }

            self.response
                .clone()
                .ok_or_else(|| LlmError::generic("No mock response configured"))
        }

        fn model(&self) -> &str {
            &self.model
        }

        fn backend(&self) -> Backend {
            self.backend
        }

        fn provider_name(&self) -> &'static str {
            "mock"
        }

        fn supported_models(&self) -> &'static [&'static str] {
            &["mock-model", "gpt-4o"]
        }
    }
}
