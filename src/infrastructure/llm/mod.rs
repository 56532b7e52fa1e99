//! LLM provider implementations

mod factory;
mod http_client;
mod kernel;
mod openai;
mod settings;

pub use factory::{
    CacheKey, ModelFamily, ProviderConfig, ProviderFactory, BACKEND_ENV_VAR, DEFAULT_MODEL,
};
pub use http_client::{default_connector, ClientConnector, HttpClient, HttpClientTrait};
pub use kernel::{
    ChatCompletionService, ChatHistory, ChatMessageContent, Kernel, KernelProvider,
    OpenAiChatCompletion, PromptExecutionSettings, DEFAULT_SERVICE_ID,
};
pub use openai::{OpenAiProvider, DEFAULT_OPENAI_BASE_URL, OPENAI_MODELS};
pub use settings::ProviderSettings;

#[cfg(test)]
pub use http_client::mock;
