use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::sync::OnceCell;
use tracing::{debug, warn};

use super::http_client::{ClientConnector, HttpClientTrait};
use super::settings::ProviderSettings;
use crate::domain::{
    Backend, BackendError, CompletionInput, CompletionOptions, LlmError, LlmProvider,
    LlmResponse, Message, RetryPolicy, Usage,
};

pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com";

/// Model identifiers served by the OpenAI chat-completions API
pub const OPENAI_MODELS: &[&str] = &[
    "gpt-4o",
    "gpt-4o-mini",
    "gpt-4-turbo",
    "gpt-4",
    "gpt-3.5-turbo",
    "o1",
    "o3-mini",
];

/// OpenAI API provider calling the chat-completions endpoint directly
pub struct OpenAiProvider {
    model: String,
    auth_header: String,
    base_url: String,
    timeout: Option<Duration>,
    retry: RetryPolicy,
    connector: ClientConnector,
    client: OnceCell<Arc<dyn HttpClientTrait>>,
}

impl OpenAiProvider {
    /// Fails with `LlmError::Authentication` when no API key can be resolved
    pub fn new(settings: ProviderSettings) -> Result<Self, LlmError> {
        let credential = settings.credential_source.resolve()?;
        let base_url = normalize_base_url(settings.base_url.as_deref());

        Ok(Self {
            model: settings.model,
            auth_header: format!("Bearer {}", credential.api_key()),
            base_url,
            timeout: settings.timeout,
            retry: settings.retry,
            connector: settings.connector,
            client: OnceCell::new(),
        })
    }

    fn chat_completions_url(&self) -> String {
        chat_completions_url(&self.base_url)
    }

    fn headers(&self) -> Vec<(&str, &str)> {
        vec![
            ("Authorization", self.auth_header.as_str()),
            ("Content-Type", "application/json"),
        ]
    }

    /// Client handle, built on first use
    async fn client(&self) -> Result<&Arc<dyn HttpClientTrait>, LlmError> {
        self.client
            .get_or_try_init(|| async {
                debug!(provider = "openai", model = %self.model, "Building HTTP client");
                (self.connector)(self.timeout)
            })
            .await
    }

    async fn send_once(
        &self,
        url: &str,
        body: &serde_json::Value,
        timeout: Option<Duration>,
        attempt: u32,
    ) -> Result<ChatCompletion, LlmError> {
        let client = self.client().await?;

        debug!(provider = "openai", model = %self.model, attempt, "Sending chat completion");

        let json = client
            .post_json(url, self.headers(), body, timeout)
            .await
            .map_err(|e| LlmError::from_backend("openai", &e))?;

        parse_chat_response(json).map_err(|e| LlmError::from_backend("openai", &e))
    }
}

impl fmt::Debug for OpenAiProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenAiProvider")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .field("client_initialized", &self.client.initialized())
            .finish()
    }
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    async fn complete(
        &self,
        input: CompletionInput,
        options: CompletionOptions,
    ) -> Result<LlmResponse, LlmError> {
        let messages = input.into_messages();
        let body = build_chat_body(&self.model, &messages, &options);
        let url = self.chat_completions_url();
        let timeout = options.timeout.or(self.timeout);

        let completion = self
            .retry
            .run("openai", |attempt| self.send_once(&url, &body, timeout, attempt))
            .await?;

        let mut choices = completion.choices.into_iter();
        let choice = choices
            .next()
            .ok_or_else(|| LlmError::generic("openai: No choices in response"))?;

        let mut response = LlmResponse::new(choice.content, completion.model)
            .with_usage(completion.usage)
            .with_metadata("provider", serde_json::json!("openai"))
            .with_metadata("backend", serde_json::json!(Backend::Direct.as_str()));

        if let Some(reason) = choice.finish_reason {
            response = response.with_finish_reason(reason);
        }

        if let Some(id) = completion.id {
            response = response.with_metadata("id", serde_json::json!(id));
        }

        Ok(response)
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn backend(&self) -> Backend {
        Backend::Direct
    }

    fn provider_name(&self) -> &'static str {
        "openai"
    }

    fn supported_models(&self) -> &'static [&'static str] {
        OPENAI_MODELS
    }
}

pub(crate) fn normalize_base_url(base_url: Option<&str>) -> String {
    base_url
        .unwrap_or(DEFAULT_OPENAI_BASE_URL)
        .trim_end_matches('/')
        .to_string()
}

pub(crate) fn chat_completions_url(base_url: &str) -> String {
    format!("{}/v1/chat/completions", base_url)
}

/// Body keys owned by the provider; `extra` cannot replace them
const RESERVED_BODY_KEYS: &[&str] = &["model", "messages"];

/// Request body for the chat-completions endpoint
pub(crate) fn build_chat_body(
    model: &str,
    messages: &[Message],
    options: &CompletionOptions,
) -> serde_json::Value {
    let wire: Vec<serde_json::Value> = messages.iter().map(Message::to_wire).collect();

    let mut body = serde_json::json!({
        "model": model,
        "messages": wire,
        "temperature": options.temperature,
    });

    if let Some(max_tokens) = options.max_tokens {
        body["max_tokens"] = serde_json::json!(max_tokens);
    }

    for (key, value) in &options.extra {
        if RESERVED_BODY_KEYS.contains(&key.as_str()) {
            warn!(key = %key, "Ignoring extra option that would replace the request payload");
            continue;
        }
        body[key.as_str()] = value.clone();
    }

    body
}

/// Parsed chat-completions response
#[derive(Debug, Clone)]
pub(crate) struct ChatCompletion {
    pub id: Option<String>,
    pub model: String,
    pub choices: Vec<ChatChoice>,
    pub usage: Usage,
}

#[derive(Debug, Clone)]
pub(crate) struct ChatChoice {
    pub content: String,
    pub finish_reason: Option<String>,
}

pub(crate) fn parse_chat_response(json: serde_json::Value) -> Result<ChatCompletion, BackendError> {
    let response: OpenAiResponse = serde_json::from_value(json)
        .map_err(|e| BackendError::new(format!("Failed to parse response: {}", e)))?;

    let usage = response
        .usage
        .map(|u| {
            let usage = Usage::new(u.prompt_tokens, u.completion_tokens);
            match u.total_tokens {
                Some(total) => usage.with_total(total),
                None => usage,
            }
        })
        .unwrap_or_default();

    Ok(ChatCompletion {
        id: response.id,
        model: response.model,
        choices: response
            .choices
            .into_iter()
            .map(|c| ChatChoice {
                content: c.message.content.unwrap_or_default(),
                finish_reason: c.finish_reason,
            })
            .collect(),
        usage,
    })
}

// OpenAI API types

#[derive(Debug, Deserialize)]
struct OpenAiResponse {
    id: Option<String>,
    model: String,
    choices: Vec<OpenAiChoice>,
    usage: Option<OpenAiUsage>,
}

#[derive(Debug, Deserialize)]
struct OpenAiChoice {
    message: OpenAiResponseMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAiResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAiUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    #[serde(default)]
    total_tokens: Option<u32>,
}
