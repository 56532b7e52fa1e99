//! Kernel-mediated completions
//!
//! A `Kernel` owns named chat-completion services. The provider converts the
//! caller's messages into a `ChatHistory`, picks the registered service and
//! lets it talk to the model.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::OnceCell;
use tracing::{debug, info};

#[cfg(test)]
use mockall::automock;

use super::http_client::{ClientConnector, HttpClientTrait};
use super::openai::{
    build_chat_body, chat_completions_url, normalize_base_url, parse_chat_response, OPENAI_MODELS,
};
use super::settings::ProviderSettings;
use crate::domain::{
    Backend, BackendError, CompletionInput, CompletionOptions, LlmError, LlmProvider,
    LlmResponse, Message, MessageRole, RetryPolicy, Usage,
};

/// Service id the provider registers its chat service under
pub const DEFAULT_SERVICE_ID: &str = "openai-chat";

/// Ordered conversation handed to a chat service
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChatHistory {
    messages: Vec<Message>,
}

impl ChatHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_system_message(&mut self, content: impl Into<String>) {
        self.messages.push(Message::system(content));
    }

    pub fn add_user_message(&mut self, content: impl Into<String>) {
        self.messages.push(Message::user(content));
    }

    pub fn add_assistant_message(&mut self, content: impl Into<String>) {
        self.messages.push(Message::assistant(content));
    }

    pub fn add_message(&mut self, message: Message) {
        self.messages.push(message);
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

impl From<Vec<Message>> for ChatHistory {
    fn from(messages: Vec<Message>) -> Self {
        Self { messages }
    }
}

/// Settings for one kernel invocation
#[derive(Debug, Clone, PartialEq)]
pub struct PromptExecutionSettings {
    pub service_id: String,
    pub model_id: String,
    pub temperature: f32,
    pub max_tokens: Option<u32>,
    pub timeout: Option<Duration>,
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl PromptExecutionSettings {
    pub fn from_options(
        service_id: impl Into<String>,
        model_id: impl Into<String>,
        options: &CompletionOptions,
    ) -> Self {
        Self {
            service_id: service_id.into(),
            model_id: model_id.into(),
            temperature: options.temperature,
            max_tokens: options.max_tokens,
            timeout: options.timeout,
            extra: options.extra.clone(),
        }
    }

    fn as_options(&self) -> CompletionOptions {
        CompletionOptions {
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            timeout: self.timeout,
            extra: self.extra.clone(),
        }
    }
}

/// One choice returned by a chat service
#[derive(Debug, Clone, PartialEq)]
pub struct ChatMessageContent {
    pub role: MessageRole,
    pub content: String,
    pub model_id: Option<String>,
    pub finish_reason: Option<String>,
    pub usage: Option<Usage>,
    pub metadata: HashMap<String, serde_json::Value>,
}

impl ChatMessageContent {
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
            model_id: None,
            finish_reason: None,
            usage: None,
            metadata: HashMap::new(),
        }
    }
}

/// Chat-completion service that can be registered with a kernel
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ChatCompletionService: Send + Sync {
    async fn get_chat_message_contents(
        &self,
        history: &ChatHistory,
        settings: &PromptExecutionSettings,
    ) -> Result<Vec<ChatMessageContent>, BackendError>;
}

/// Registry of chat services
#[derive(Default)]
pub struct Kernel {
    services: HashMap<String, Arc<dyn ChatCompletionService>>,
}

impl Kernel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_service(
        mut self,
        service_id: impl Into<String>,
        service: Arc<dyn ChatCompletionService>,
    ) -> Self {
        self.services.insert(service_id.into(), service);
        self
    }

    pub fn service(&self, service_id: &str) -> Result<&Arc<dyn ChatCompletionService>, LlmError> {
        self.services.get(service_id).ok_or_else(|| {
            LlmError::configuration(format!("No chat service registered as '{}'", service_id))
        })
    }

    pub fn service_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.services.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }

    /// Run the service named in `settings` against `history`
    pub async fn invoke_chat(
        &self,
        history: &ChatHistory,
        settings: &PromptExecutionSettings,
    ) -> Result<Vec<ChatMessageContent>, LlmError> {
        let service = self.service(&settings.service_id)?;

        service
            .get_chat_message_contents(history, settings)
            .await
            .map_err(|e| LlmError::from_backend("kernel", &e))
    }
}

impl fmt::Debug for Kernel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Kernel")
            .field("services", &self.service_ids())
            .finish()
    }
}

/// OpenAI chat-completions as a kernel service
pub struct OpenAiChatCompletion {
    client: Arc<dyn HttpClientTrait>,
    auth_header: String,
    base_url: String,
}

impl OpenAiChatCompletion {
    pub fn new(
        client: Arc<dyn HttpClientTrait>,
        api_key: &str,
        base_url: Option<&str>,
    ) -> Self {
        Self {
            client,
            auth_header: format!("Bearer {}", api_key),
            base_url: normalize_base_url(base_url),
        }
    }
}

#[async_trait]
impl ChatCompletionService for OpenAiChatCompletion {
    async fn get_chat_message_contents(
        &self,
        history: &ChatHistory,
        settings: &PromptExecutionSettings,
    ) -> Result<Vec<ChatMessageContent>, BackendError> {
        let body = build_chat_body(&settings.model_id, history.messages(), &settings.as_options());
        let headers = vec![
            ("Authorization", self.auth_header.as_str()),
            ("Content-Type", "application/json"),
        ];

        let json = self
            .client
            .post_json(&chat_completions_url(&self.base_url), headers, &body, settings.timeout)
            .await?;
        let completion = parse_chat_response(json)?;

        let usage = completion.usage;
        let model = completion.model;
        let id = completion.id;

        Ok(completion
            .choices
            .into_iter()
            .map(|choice| {
                let mut content = ChatMessageContent::assistant(choice.content);
                content.model_id = Some(model.clone());
                content.finish_reason = choice.finish_reason;
                content.usage = Some(usage);
                if let Some(ref id) = id {
                    content
                        .metadata
                        .insert("id".to_string(), serde_json::json!(id));
                }
                content
            })
            .collect())
    }
}

/// Provider that routes completions through a `Kernel`
pub struct KernelProvider {
    model: String,
    api_key: String,
    base_url: Option<String>,
    timeout: Option<Duration>,
    retry: RetryPolicy,
    connector: ClientConnector,
    service_id: String,
    chat_service: Option<Arc<dyn ChatCompletionService>>,
    kernel: OnceCell<Kernel>,
}

impl KernelProvider {
    /// Fails with `LlmError::Authentication` when no API key can be resolved
    pub fn new(settings: ProviderSettings) -> Result<Self, LlmError> {
        let credential = settings.credential_source.resolve()?;

        Ok(Self {
            model: settings.model,
            api_key: credential.api_key().to_string(),
            base_url: settings.base_url,
            timeout: settings.timeout,
            retry: settings.retry,
            connector: settings.connector,
            service_id: DEFAULT_SERVICE_ID.to_string(),
            chat_service: None,
            kernel: OnceCell::new(),
        })
    }

    /// Register `service` instead of the built-in OpenAI service
    pub fn with_chat_service(
        mut self,
        service_id: impl Into<String>,
        service: Arc<dyn ChatCompletionService>,
    ) -> Self {
        self.service_id = service_id.into();
        self.chat_service = Some(service);
        self
    }

    pub fn service_id(&self) -> &str {
        &self.service_id
    }

    /// Kernel with the chat service registered, built on first use
    async fn kernel(&self) -> Result<&Kernel, LlmError> {
        self.kernel
            .get_or_try_init(|| async {
                let service = match self.chat_service {
                    Some(ref service) => service.clone(),
                    None => {
                        let client = (self.connector)(self.timeout)?;
                        Arc::new(OpenAiChatCompletion::new(
                            client,
                            &self.api_key,
                            self.base_url.as_deref(),
                        )) as Arc<dyn ChatCompletionService>
                    }
                };

                info!(
                    provider = "kernel",
                    model = %self.model,
                    service_id = %self.service_id,
                    "Kernel initialized"
                );

                Ok::<_, LlmError>(Kernel::new().add_service(self.service_id.clone(), service))
            })
            .await
    }

    async fn invoke_once(
        &self,
        history: &ChatHistory,
        settings: &PromptExecutionSettings,
        attempt: u32,
    ) -> Result<ChatMessageContent, LlmError> {
        let kernel = self.kernel().await?;

        debug!(provider = "kernel", model = %self.model, attempt, "Invoking chat service");

        kernel
            .invoke_chat(history, settings)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| LlmError::generic("kernel returned no response choices"))
    }
}

impl fmt::Debug for KernelProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KernelProvider")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("service_id", &self.service_id)
            .field("kernel", &self.kernel.get())
            .finish()
    }
}

#[async_trait]
impl LlmProvider for KernelProvider {
    async fn complete(
        &self,
        input: CompletionInput,
        options: CompletionOptions,
    ) -> Result<LlmResponse, LlmError> {
        let history = ChatHistory::from(input.into_messages());
        let mut settings = PromptExecutionSettings::from_options(&self.service_id, &self.model, &options);
        settings.timeout = settings.timeout.or(self.timeout);

        let content = self
            .retry
            .run("kernel", |attempt| self.invoke_once(&history, &settings, attempt))
            .await?;

        let model = content.model_id.unwrap_or_else(|| self.model.clone());
        let mut response = LlmResponse::new(content.content, model)
            .with_usage(content.usage.unwrap_or_default())
            .with_metadata("provider", serde_json::json!("kernel"))
            .with_metadata("backend", serde_json::json!(Backend::Kernel.as_str()))
            .with_metadata("service_id", serde_json::json!(self.service_id));

        if let Some(reason) = content.finish_reason {
            response = response.with_finish_reason(reason);
        }

        for (key, value) in content.metadata {
            response = response.with_metadata(key, value);
        }

        Ok(response)
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn backend(&self) -> Backend {
        Backend::Kernel
    }

    fn provider_name(&self) -> &'static str {
        "kernel"
    }

    fn supported_models(&self) -> &'static [&'static str] {
        OPENAI_MODELS
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ErrorKind;
    use crate::infrastructure::llm::http_client::mock::{connector, MockHttpClient};
    use mockall::Sequence;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn provider_with_service(service: MockChatCompletionService) -> KernelProvider {
        KernelProvider::new(ProviderSettings::with_api_key("gpt-4o", "k"))
            .unwrap()
            .with_chat_service("test-chat", Arc::new(service))
    }

    #[test]
    fn test_chat_history_from_messages() {
        let history = ChatHistory::from(vec![Message::system("rules"), Message::user("hi")]);

        assert_eq!(history.len(), 2);
        assert_eq!(history.messages()[0].role(), MessageRole::System);
    }

    #[tokio::test]
    async fn test_kernel_complete_uses_registered_service() {
        let mut service = MockChatCompletionService::new();
        service
            .expect_get_chat_message_contents()
            .withf(|history, settings| {
                history.len() == 1
                    && history.messages()[0].content() == "Hello"
                    && settings.service_id == "test-chat"
                    && settings.model_id == "gpt-4o"
                    && settings.temperature == 0.2
            })
            .times(1)
            .returning(|_, _| {
                let mut content = ChatMessageContent::assistant("Hi there");
                content.finish_reason = Some("stop".to_string());
                content.usage = Some(Usage::new(4, 2));
                Ok(vec![content])
            });

        let provider = provider_with_service(service);
        let response = provider
            .complete("Hello".into(), CompletionOptions::new().temperature(0.2))
            .await
            .unwrap();

        assert_eq!(response.content, "Hi there");
        assert_eq!(response.model, "gpt-4o");
        assert_eq!(response.usage.total_tokens, 6);
        assert_eq!(response.metadata["backend"], "kernel");
        assert_eq!(response.metadata["service_id"], "test-chat");
    }

    #[tokio::test]
    async fn test_zero_choices_is_generic_error() {
        let mut service = MockChatCompletionService::new();
        service
            .expect_get_chat_message_contents()
            .times(1)
            .returning(|_, _| Ok(vec![]));

        let err = provider_with_service(service)
            .complete("Hello".into(), CompletionOptions::default())
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Generic);
        assert!(err.message().contains("kernel returned no response choices"));
    }

    #[tokio::test]
    async fn test_provider_timeout_is_default_for_execution_settings() {
        let mut seq = Sequence::new();
        let mut service = MockChatCompletionService::new();
        service
            .expect_get_chat_message_contents()
            .withf(|_, settings| settings.timeout == Some(Duration::from_secs(20)))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(vec![ChatMessageContent::assistant("first")]));
        service
            .expect_get_chat_message_contents()
            .withf(|_, settings| settings.timeout == Some(Duration::from_secs(2)))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(vec![ChatMessageContent::assistant("second")]));

        let provider = KernelProvider::new(
            ProviderSettings::with_api_key("gpt-4o", "k").with_timeout(Duration::from_secs(20)),
        )
        .unwrap()
        .with_chat_service("test-chat", Arc::new(service));

        provider
            .complete("Hello".into(), CompletionOptions::default())
            .await
            .unwrap();
        provider
            .complete("Hello".into(), CompletionOptions::default().timeout_secs(2))
            .await
            .unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_kernel_retries_rate_limit() {
        let mut seq = Sequence::new();
        let mut service = MockChatCompletionService::new();
        service
            .expect_get_chat_message_contents()
            .times(2)
            .in_sequence(&mut seq)
            .returning(|_, _| Err(BackendError::new("Error code: 429 - rate_limit_exceeded")));
        service
            .expect_get_chat_message_contents()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(vec![ChatMessageContent::assistant("finally")]));

        let response = provider_with_service(service)
            .complete("Hello".into(), CompletionOptions::default())
            .await
            .unwrap();

        assert_eq!(response.content, "finally");
    }

    #[tokio::test]
    async fn test_kernel_classifies_timeout() {
        let mut service = MockChatCompletionService::new();
        service
            .expect_get_chat_message_contents()
            .times(1)
            .returning(|_, _| Err(BackendError::timed_out("Request timeout: deadline elapsed")));

        let err = provider_with_service(service)
            .complete("Hello".into(), CompletionOptions::default())
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Timeout);
    }

    #[tokio::test]
    async fn test_missing_service_is_configuration_error() {
        let kernel = Kernel::new();
        let settings = PromptExecutionSettings::from_options(
            "absent",
            "gpt-4o",
            &CompletionOptions::default(),
        );

        let err = kernel
            .invoke_chat(&ChatHistory::new(), &settings)
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Configuration);
    }

    #[tokio::test]
    async fn test_default_service_goes_through_http_client() {
        let url = "https://api.openai.com/v1/chat/completions";
        let client = Arc::new(MockHttpClient::new().with_response(
            url,
            serde_json::json!({
                "id": "chatcmpl-k",
                "model": "gpt-4o",
                "choices": [{"message": {"content": "via kernel"}, "finish_reason": "stop"}],
                "usage": {"prompt_tokens": 1, "completion_tokens": 2}
            }),
        ));
        let builds = Arc::new(AtomicUsize::new(0));
        let provider = KernelProvider::new(
            ProviderSettings::with_api_key("gpt-4o", "k")
                .with_connector(connector(client.clone(), builds.clone())),
        )
        .unwrap();

        for _ in 0..2 {
            let response = provider
                .complete("Hello".into(), CompletionOptions::default())
                .await
                .unwrap();
            assert_eq!(response.content, "via kernel");
            assert_eq!(response.metadata["id"], "chatcmpl-k");
            assert_eq!(response.metadata["service_id"], DEFAULT_SERVICE_ID);
        }

        assert_eq!(builds.load(Ordering::SeqCst), 1);
        assert_eq!(client.request_count(), 2);
    }
}
