use std::env;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::http_client::{default_connector, ClientConnector};
use super::kernel::KernelProvider;
use super::openai::{OpenAiProvider, OPENAI_MODELS};
use super::settings::ProviderSettings;
use crate::domain::{matches_supported, Backend, LlmError, LlmProvider, RetryPolicy};
use crate::infrastructure::credentials::ApiKeySource;

/// Model used when the configuration does not name one
pub const DEFAULT_MODEL: &str = "gpt-4o";

/// Environment variable consulted last when choosing the backend
pub const BACKEND_ENV_VAR: &str = "USE_SEMANTIC_KERNEL";

/// Provider configuration as read from a config file or JSON map
#[derive(Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,
    /// Environment variable holding the API key when `api_key` is absent
    #[serde(default)]
    pub api_key_env: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
    /// Request timeout in seconds
    #[serde(default)]
    pub timeout: Option<u64>,
    #[serde(default)]
    pub use_semantic_kernel: Option<bool>,
}

impl ProviderConfig {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: Some(model.into()),
            ..Default::default()
        }
    }

    /// Parse from an untyped JSON map
    pub fn from_value(value: serde_json::Value) -> Result<Self, LlmError> {
        serde_json::from_value(value)
            .map_err(|e| LlmError::configuration(format!("Invalid provider configuration: {}", e)))
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_api_key_env(mut self, var: impl Into<String>) -> Self {
        self.api_key_env = Some(var.into());
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout = Some(secs);
        self
    }

    pub fn with_semantic_kernel(mut self, enabled: bool) -> Self {
        self.use_semantic_kernel = Some(enabled);
        self
    }

    pub fn model_or_default(&self) -> &str {
        self.model.as_deref().unwrap_or(DEFAULT_MODEL)
    }

    pub fn api_key_source(&self) -> ApiKeySource {
        ApiKeySource::from_config(self.api_key.as_deref(), self.api_key_env.as_deref())
    }
}

impl fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("model", &self.model)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("api_key_env", &self.api_key_env)
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .field("use_semantic_kernel", &self.use_semantic_kernel)
            .finish()
    }
}

/// Group of models served by one wire protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModelFamily {
    OpenAi,
}

impl ModelFamily {
    const ALL: [ModelFamily; 1] = [ModelFamily::OpenAi];

    pub fn models(&self) -> &'static [&'static str] {
        match self {
            Self::OpenAi => OPENAI_MODELS,
        }
    }

    pub fn resolve(model: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|family| matches_supported(family.models(), model))
    }

    /// Every identifier the factory can build a provider for
    pub fn all_models() -> Vec<&'static str> {
        Self::ALL
            .iter()
            .flat_map(|family| family.models().iter().copied())
            .collect()
    }
}

/// Identity of a cached provider
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub model: String,
    pub credential_source: String,
    pub backend: Backend,
}

/// Accepts `true`, `1` and `yes` in any case
fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "true" | "1" | "yes"
    )
}

/// Resolves configurations to providers and caches the instances it builds
pub struct ProviderFactory {
    cache: Cache<CacheKey, Arc<dyn LlmProvider>>,
    connector: ClientConnector,
    retry: RetryPolicy,
    backend_env_var: String,
}

impl ProviderFactory {
    pub fn new() -> Self {
        Self {
            cache: Cache::builder().build(),
            connector: default_connector(),
            retry: RetryPolicy::default(),
            backend_env_var: BACKEND_ENV_VAR.to_string(),
        }
    }

    /// Transport handed to every provider this factory builds
    pub fn with_connector(mut self, connector: ClientConnector) -> Self {
        self.connector = connector;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_backend_env_var(mut self, var: impl Into<String>) -> Self {
        self.backend_env_var = var.into();
        self
    }

    /// Choose the backend: explicit flag, then config, then environment.
    ///
    /// The first source that is present decides, even when it says `false`.
    pub fn resolve_backend(&self, config: &ProviderConfig, backend_flag: Option<bool>) -> Backend {
        let use_kernel = backend_flag
            .or(config.use_semantic_kernel)
            .or_else(|| env::var(&self.backend_env_var).ok().map(|v| parse_flag(&v)))
            .unwrap_or(false);

        Backend::from_flag(use_kernel)
    }

    pub fn cache_key(&self, config: &ProviderConfig, backend: Backend) -> CacheKey {
        CacheKey {
            model: config.model_or_default().to_string(),
            credential_source: config.api_key_source().marker().to_string(),
            backend,
        }
    }

    /// Resolve `config` to a provider.
    ///
    /// With `use_cache` a provider built earlier for the same model,
    /// credential source and backend is returned as-is.
    pub async fn create_provider(
        &self,
        config: &ProviderConfig,
        use_cache: bool,
        backend_flag: Option<bool>,
    ) -> Result<Arc<dyn LlmProvider>, LlmError> {
        let backend = self.resolve_backend(config, backend_flag);
        let key = self.cache_key(config, backend);

        if !use_cache {
            return self.build(config, backend);
        }

        if let Some(provider) = self.cache.get(&key).await {
            debug!(
                model = %key.model,
                credential_source = %key.credential_source,
                backend = %backend,
                "Provider cache hit"
            );
            return Ok(provider);
        }

        self.cache
            .try_get_with(key, async { self.build(config, backend) })
            .await
            .map_err(|e| (*e).clone())
    }

    fn build(
        &self,
        config: &ProviderConfig,
        backend: Backend,
    ) -> Result<Arc<dyn LlmProvider>, LlmError> {
        let model = config.model_or_default();

        let family = ModelFamily::resolve(model).ok_or_else(|| {
            LlmError::configuration(format!(
                "Unsupported model '{}'. Supported models: {}",
                model,
                ModelFamily::all_models().join(", ")
            ))
        })?;

        let mut settings = ProviderSettings::new(model, config.api_key_source())
            .with_retry(self.retry.clone())
            .with_connector(self.connector.clone());

        if let Some(ref base_url) = config.base_url {
            settings = settings.with_base_url(base_url);
        }

        if let Some(secs) = config.timeout {
            settings = settings.with_timeout(Duration::from_secs(secs));
        }

        let provider: Arc<dyn LlmProvider> = match (family, backend) {
            (ModelFamily::OpenAi, Backend::Direct) => Arc::new(OpenAiProvider::new(settings)?),
            (ModelFamily::OpenAi, Backend::Kernel) => Arc::new(KernelProvider::new(settings)?),
        };

        info!(
            model,
            backend = %backend,
            provider = provider.provider_name(),
            "Created LLM provider"
        );

        Ok(provider)
    }

    /// Drop every cached provider
    pub fn clear_cache(&self) {
        self.cache.invalidate_all();
    }

    /// Number of cached providers
    pub async fn cached_count(&self) -> u64 {
        self.cache.run_pending_tasks().await;
        self.cache.entry_count()
    }
}

impl Default for ProviderFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ProviderFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderFactory")
            .field("cached", &self.cache.entry_count())
            .field("retry", &self.retry)
            .field("backend_env_var", &self.backend_env_var)
            .finish()
    }
}
