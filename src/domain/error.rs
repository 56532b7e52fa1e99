use thiserror::Error;

/// Coarse category of an LLM failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Generic,
    RateLimit,
    Authentication,
    Timeout,
    Configuration,
}

/// Errors surfaced by providers and the provider factory.
///
/// Every variant carries the original backend text so failures can be
/// debugged, but never the credential that was used for the call.
#[derive(Debug, Clone, Error)]
pub enum LlmError {
    #[error("LLM error: {message}")]
    Generic { message: String },

    #[error("Rate limit error: {message}")]
    RateLimit { message: String },

    #[error("Authentication error: {message}")]
    Authentication { message: String },

    #[error("Timeout error: {message}")]
    Timeout { message: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },
}

impl LlmError {
    pub fn generic(message: impl Into<String>) -> Self {
        Self::Generic {
            message: message.into(),
        }
    }

    pub fn rate_limit(message: impl Into<String>) -> Self {
        Self::RateLimit {
            message: message.into(),
        }
    }

    pub fn authentication(message: impl Into<String>) -> Self {
        Self::Authentication {
            message: message.into(),
        }
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::Timeout {
            message: message.into(),
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Build a typed error of the given kind
    pub fn of_kind(kind: ErrorKind, message: impl Into<String>) -> Self {
        match kind {
            ErrorKind::Generic => Self::generic(message),
            ErrorKind::RateLimit => Self::rate_limit(message),
            ErrorKind::Authentication => Self::authentication(message),
            ErrorKind::Timeout => Self::timeout(message),
            ErrorKind::Configuration => Self::configuration(message),
        }
    }

    /// Translate a raw backend failure into the taxonomy
    pub fn from_backend(provider: &str, error: &BackendError) -> Self {
        Self::of_kind(error.kind(), format!("{}: {}", provider, error))
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Generic { .. } => ErrorKind::Generic,
            Self::RateLimit { .. } => ErrorKind::RateLimit,
            Self::Authentication { .. } => ErrorKind::Authentication,
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::Configuration { .. } => ErrorKind::Configuration,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Self::Generic { message }
            | Self::RateLimit { message }
            | Self::Authentication { message }
            | Self::Timeout { message }
            | Self::Configuration { message } => message,
        }
    }

    pub fn is_rate_limit(&self) -> bool {
        self.kind() == ErrorKind::RateLimit
    }
}

/// Classify raw backend error text by substring.
///
/// Best-effort only: backends do not expose structured codes in their error
/// text, so a message that happens to mention "timeout" in an unrelated
/// context is classified as a timeout.
pub fn classify(raw: &str) -> ErrorKind {
    let text = raw.to_lowercase();

    if text.contains("rate_limit") || text.contains("rate limit") {
        ErrorKind::RateLimit
    } else if text.contains("authentication")
        || text.contains("api_key")
        || text.contains("unauthorized")
    {
        ErrorKind::Authentication
    } else if text.contains("timeout") {
        ErrorKind::Timeout
    } else {
        ErrorKind::Generic
    }
}

/// Untyped failure reported by a transport or backend SDK
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct BackendError {
    pub status: Option<u16>,
    pub timed_out: bool,
    pub message: String,
}

impl BackendError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            status: None,
            timed_out: false,
            message: message.into(),
        }
    }

    pub fn with_status(status: u16, message: impl Into<String>) -> Self {
        Self {
            status: Some(status),
            timed_out: false,
            message: message.into(),
        }
    }

    pub fn timed_out(message: impl Into<String>) -> Self {
        Self {
            status: None,
            timed_out: true,
            message: message.into(),
        }
    }

    /// Status code first, then the substring heuristic
    pub fn kind(&self) -> ErrorKind {
        if self.timed_out {
            return ErrorKind::Timeout;
        }

        match self.status {
            Some(429) => ErrorKind::RateLimit,
            Some(401) | Some(403) => ErrorKind::Authentication,
            Some(408) | Some(504) => ErrorKind::Timeout,
            _ => classify(&self.message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_rate_limit() {
        assert_eq!(classify("Error code: rate_limit_exceeded"), ErrorKind::RateLimit);
        assert_eq!(classify("Rate Limit reached for gpt-4o"), ErrorKind::RateLimit);
    }

    #[test]
    fn test_classify_authentication() {
        assert_eq!(classify("AuthenticationError: bad key"), ErrorKind::Authentication);
        assert_eq!(classify("Incorrect API_KEY provided"), ErrorKind::Authentication);
        assert_eq!(classify("401 Unauthorized"), ErrorKind::Authentication);
    }

    #[test]
    fn test_classify_timeout_and_generic() {
        assert_eq!(classify("Request Timeout after 30s"), ErrorKind::Timeout);
        assert_eq!(classify("connection reset by peer"), ErrorKind::Generic);
        assert_eq!(classify(""), ErrorKind::Generic);
    }

    #[test]
    fn test_classify_prefers_rate_limit_over_timeout() {
        assert_eq!(
            classify("rate limit hit, retry after timeout"),
            ErrorKind::RateLimit
        );
    }

    #[test]
    fn test_backend_error_status_wins_over_text() {
        assert_eq!(
            BackendError::with_status(429, "Too Many Requests").kind(),
            ErrorKind::RateLimit
        );
        assert_eq!(
            BackendError::with_status(403, "forbidden").kind(),
            ErrorKind::Authentication
        );
        assert_eq!(
            BackendError::with_status(500, "upstream timeout").kind(),
            ErrorKind::Timeout
        );
        assert_eq!(BackendError::timed_out("elapsed").kind(), ErrorKind::Timeout);
    }

    #[test]
    fn test_from_backend_keeps_original_text() {
        let error = LlmError::from_backend(
            "openai",
            &BackendError::with_status(401, "HTTP 401: invalid key"),
        );

        assert_eq!(error.kind(), ErrorKind::Authentication);
        assert_eq!(
            error.to_string(),
            "Authentication error: openai: HTTP 401: invalid key"
        );
    }
}
