use std::fmt;
use std::time::Duration;

use super::http_client::{default_connector, ClientConnector};
use crate::domain::RetryPolicy;
use crate::infrastructure::credentials::ApiKeySource;

/// Long-lived configuration shared by every backend
#[derive(Clone)]
pub struct ProviderSettings {
    pub model: String,
    pub credential_source: ApiKeySource,
    pub base_url: Option<String>,
    /// Default request timeout, overridable per call
    pub timeout: Option<Duration>,
    pub retry: RetryPolicy,
    pub connector: ClientConnector,
}

impl ProviderSettings {
    pub fn new(model: impl Into<String>, credential_source: ApiKeySource) -> Self {
        Self {
            model: model.into(),
            credential_source,
            base_url: None,
            timeout: None,
            retry: RetryPolicy::default(),
            connector: default_connector(),
        }
    }

    pub fn with_api_key(model: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self::new(model, ApiKeySource::Explicit(api_key.into()))
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_connector(mut self, connector: ClientConnector) -> Self {
        self.connector = connector;
        self
    }
}

impl fmt::Debug for ProviderSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderSettings")
            .field("model", &self.model)
            .field("credential_source", &self.credential_source)
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}
