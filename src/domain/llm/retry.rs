use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::domain::LlmError;

/// Exponential backoff applied to rate-limited calls
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total calls, the first one included
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub backoff_multiplier: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_secs(1),
            backoff_multiplier: 2,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            ..Default::default()
        }
    }

    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Delay before retry number `retry` (0-indexed)
    pub fn delay_for_retry(&self, retry: u32) -> Duration {
        self.initial_delay * self.backoff_multiplier.saturating_pow(retry)
    }

    /// Run `operation`, retrying only rate-limit failures.
    ///
    /// Any other error is returned on the attempt that produced it. When the
    /// attempts are used up the last rate-limit error is reported as
    /// `LlmError::RateLimit`. A policy of zero attempts still calls once.
    pub async fn run<T, F, Fut>(&self, provider: &str, mut operation: F) -> Result<T, LlmError>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, LlmError>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            let error = match operation(attempt).await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_rate_limit() => e,
                Err(e) => return Err(e),
            };

            if attempt >= max_attempts {
                return Err(LlmError::rate_limit(format!(
                    "giving up after {} attempts: {}",
                    max_attempts,
                    error.message()
                )));
            }

            let delay = self.delay_for_retry(attempt - 1);
            warn!(
                provider,
                attempt,
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "Rate limited, backing off"
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}
