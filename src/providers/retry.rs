//! Retry configuration, delay calculation, and the shared retry loop.
//!
//! Providers never retry on their own. The orchestrator wraps each
//! deadline-bounded call in [`with_retry`], which re-issues the call on
//! transient errors (see [`GenError::is_transient`]) with capped
//! exponential backoff.
//!
//! Sleeping goes through the [`Delay`] trait so tests can observe or skip
//! backoff without touching the runtime clock.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use tracing::warn;

use crate::telemetry;
use crate::{GenError, Result};

/// Configuration for retry behaviour on transient errors.
///
/// ```rust
/// # use genpipe::RetryConfig;
/// # use std::time::Duration;
/// let config = RetryConfig::new()
///     .retry_attempts(3)
///     .base_delay(Duration::from_millis(200));
/// assert_eq!(config.delay_for_attempt(1), Duration::from_millis(400));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryConfig {
    /// Retries after the first attempt. 0 = no retry. Default: 2.
    pub retry_attempts: u32,
    /// Delay before the first retry. Default: 250ms.
    pub base_delay: Duration,
    /// Cap on any single delay. Default: 5s.
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            retry_attempts: 2,
            base_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(5),
        }
    }
}

impl RetryConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// A config that makes exactly one attempt.
    pub fn disabled() -> Self {
        Self {
            retry_attempts: 0,
            ..Self::default()
        }
    }

    pub fn retry_attempts(mut self, n: u32) -> Self {
        self.retry_attempts = n;
        self
    }

    pub fn base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    pub fn max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Total attempts, the first one included.
    pub fn total_attempts(&self) -> u32 {
        self.retry_attempts.saturating_add(1)
    }

    /// Delay before retry number `attempt + 1` (0-indexed):
    /// `base_delay * 2^attempt`, capped at `max_delay`.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let delay = self
            .base_delay
            .saturating_mul(2u32.saturating_pow(attempt));
        delay.min(self.max_delay)
    }
}

/// Sleeps between attempts.
#[async_trait]
pub trait Delay: Send + Sync {
    async fn wait(&self, duration: Duration);
}

/// Sleeps on the tokio timer.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioDelay;

#[async_trait]
impl Delay for TokioDelay {
    async fn wait(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Returns immediately. For tests and for callers that want tight retries.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoDelay;

#[async_trait]
impl Delay for NoDelay {
    async fn wait(&self, _duration: Duration) {}
}

/// Execute an async operation with retry logic.
///
/// Transient errors are retried up to `config.retry_attempts` times; the
/// last one is returned if every attempt fails. Permanent errors are
/// returned immediately.
pub async fn with_retry<F, Fut, T>(
    config: &RetryConfig,
    delay: &dyn Delay,
    provider_name: &str,
    f: F,
) -> Result<T>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut last_err = None;
    for attempt in 0..config.total_attempts() {
        match f().await {
            Ok(result) => return Ok(result),
            Err(e) if e.is_transient() => {
                if attempt < config.retry_attempts {
                    metrics::counter!(telemetry::RETRIES_TOTAL,
                        "provider" => provider_name.to_owned(),
                    )
                    .increment(1);
                    let wait = config.delay_for_attempt(attempt);
                    warn!(
                        provider = provider_name,
                        attempt = attempt + 1,
                        total_attempts = config.total_attempts(),
                        delay_ms = wait.as_millis() as u64,
                        error = %e,
                        "retrying after transient error"
                    );
                    delay.wait(wait).await;
                }
                last_err = Some(e);
            }
            Err(e) => return Err(e),
        }
    }
    Err(last_err.unwrap_or(GenError::NoProvider))
}
