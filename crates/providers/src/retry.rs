//! Provider retry — bounded attempts with exponential backoff.
//!
//! Wraps any [`Provider`] and retries transient completion failures
//! (timeouts, network errors, rate limits, 5xx). Non-retryable failures
//! (auth, unknown model, 4xx) fail fast. Each attempt runs under its own
//! timeout so a hung connection counts as a failed attempt rather than a
//! stalled run.

use async_trait::async_trait;
use irontask_config::RetryConfig;
use irontask_core::error::ProviderError;
use irontask_core::provider::{Provider, ProviderRequest, ProviderResponse};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Retry knobs for the decorator.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    /// Initial backoff delay.
    pub base_delay: Duration,
    /// Backoff cap.
    pub max_delay: Duration,
    /// Timeout applied to each individual attempt.
    pub attempt_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(10),
            attempt_timeout: Duration::from_secs(120),
        }
    }
}

impl RetryPolicy {
    /// Build a policy from runtime configuration.
    pub fn from_config(retry: &RetryConfig, attempt_timeout_secs: u64) -> Self {
        Self {
            max_attempts: retry.max_attempts.max(1),
            base_delay: Duration::from_millis(retry.base_delay_ms),
            max_delay: Duration::from_millis(retry.max_delay_ms),
            attempt_timeout: Duration::from_secs(attempt_timeout_secs),
        }
    }

    /// Delay before the given retry (attempt numbers start at 1).
    fn backoff(&self, attempt: u32) -> Duration {
        let exp = self
            .base_delay
            .saturating_mul(2u32.saturating_pow(attempt.saturating_sub(1)));
        exp.min(self.max_delay)
    }
}

/// A provider decorator that retries transient failures.
pub struct RetryProvider {
    name: String,
    inner: Arc<dyn Provider>,
    policy: RetryPolicy,
}

impl RetryProvider {
    pub fn new(inner: Arc<dyn Provider>, policy: RetryPolicy) -> Self {
        Self {
            name: format!("retry({})", inner.name()),
            inner,
            policy,
        }
    }
}

#[async_trait]
impl Provider for RetryProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(
        &self,
        request: ProviderRequest,
    ) -> std::result::Result<ProviderResponse, ProviderError> {
        let mut last_error = ProviderError::NotConfigured("No attempts made".into());

        for attempt in 1..=self.policy.max_attempts {
            match tokio::time::timeout(
                self.policy.attempt_timeout,
                self.inner.complete(request.clone()),
            )
            .await
            {
                Ok(Ok(response)) => {
                    if attempt > 1 {
                        info!(provider = %self.inner.name(), attempt, "Completion succeeded after retry");
                    }
                    return Ok(response);
                }
                Ok(Err(e)) if !e.is_retryable() => {
                    warn!(provider = %self.inner.name(), error = %e, "Non-retryable provider error");
                    return Err(e);
                }
                Ok(Err(e)) => {
                    warn!(provider = %self.inner.name(), attempt, error = %e, "Retryable provider error");
                    last_error = e;
                }
                Err(_) => {
                    warn!(
                        provider = %self.inner.name(),
                        attempt,
                        timeout_secs = self.policy.attempt_timeout.as_secs(),
                        "Completion attempt timed out"
                    );
                    last_error = ProviderError::Timeout(format!(
                        "attempt timed out after {}s",
                        self.policy.attempt_timeout.as_secs()
                    ));
                }
            }

            if attempt < self.policy.max_attempts {
                // Honor the provider's retry-after hint when it exceeds our
                // computed backoff, still capped by max_delay.
                let mut delay = self.policy.backoff(attempt);
                if let ProviderError::RateLimited { retry_after_secs } = &last_error {
                    delay = delay
                        .max(Duration::from_secs(*retry_after_secs))
                        .min(self.policy.max_delay);
                }
                tokio::time::sleep(delay).await;
            }
        }

        warn!(
            provider = %self.inner.name(),
            attempts = self.policy.max_attempts,
            "All completion attempts exhausted"
        );
        Err(last_error)
    }
}
