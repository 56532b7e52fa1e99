use std::env;
use std::fmt;

use crate::domain::LlmError;

/// Environment variable read when no other name is configured
pub const DEFAULT_API_KEY_ENV: &str = "OPENAI_API_KEY";

/// Where an API key comes from
#[derive(Clone, PartialEq, Eq, Hash)]
pub enum ApiKeySource {
    /// Passed in by the caller
    Explicit(String),
    /// Read from the named environment variable
    Env(String),
}

impl ApiKeySource {
    /// A non-blank explicit key takes precedence over the environment
    pub fn from_config(api_key: Option<&str>, api_key_env: Option<&str>) -> Self {
        match api_key.filter(|key| !key.trim().is_empty()) {
            Some(key) => Self::Explicit(key.to_string()),
            None => Self::Env(api_key_env.unwrap_or(DEFAULT_API_KEY_ENV).to_string()),
        }
    }

    /// Identifier used in cache keys and logs; never contains the key itself
    pub fn marker(&self) -> &str {
        match self {
            Self::Explicit(_) => "explicit",
            Self::Env(var) => var,
        }
    }

    /// Resolve the key, failing with `LlmError::Authentication` if none is available
    pub fn resolve(&self) -> Result<Credential, LlmError> {
        match self {
            Self::Explicit(key) if !key.trim().is_empty() => Ok(Credential::new(key.clone())),
            Self::Explicit(_) => Err(LlmError::authentication("Explicit API key is empty")),
            Self::Env(var) => match env::var(var) {
                Ok(key) if !key.trim().is_empty() => Ok(Credential::new(key)),
                _ => Err(LlmError::authentication(format!(
                    "No API key provided and environment variable '{}' is not set",
                    var
                ))),
            },
        }
    }
}

impl fmt::Debug for ApiKeySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Explicit(_) => f.write_str("Explicit(<redacted>)"),
            Self::Env(var) => f.debug_tuple("Env").field(var).finish(),
        }
    }
}

/// Resolved API key; `Debug` output is redacted
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    api_key: String,
}

impl Credential {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
        }
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("api_key", &"<redacted>")
            .finish()
    }
}
