//! Provider trait and per-call settings.
//!
//! A [`Provider`] wraps one backend (a local Ollama daemon, a cloud API, a
//! mock) behind a single stateless call. Providers do not retry; the
//! orchestrator runs the bounded retry loop in [`super::retry`] around
//! [`call_with_deadline`], so every attempt carries its own deadline.
//!
//! # Example
//!
//! ```ignore
//! async fn call(&self, prompt: &str, model: &str, config: &CallConfig) -> Result<ProviderResponse> {
//!     let body = self.request_body(prompt, model, config);
//!     let value = http::send_json(self.http.post(&self.url).json(&body)).await?;
//!     // ... extract text and usage
//! }
//! ```

use std::time::Duration;

use async_trait::async_trait;

use crate::config::{MAX_CONTEXT_CEILING, MAX_TOKENS_CEILING};
use crate::types::Usage;
use crate::{GenError, Result};

/// Bounded settings for a single provider call.
///
/// Token and context limits are clamped to hard ceilings no matter what
/// the caller asks for, and the timeout is always non-zero.
#[derive(Debug, Clone, PartialEq)]
pub struct CallConfig {
    max_tokens: u32,
    max_context: u32,
    temperature: f32,
    timeout: Duration,
}

impl Default for CallConfig {
    fn default() -> Self {
        Self {
            max_tokens: 1024,
            max_context: 4096,
            temperature: 0.2,
            timeout: Duration::from_secs(30),
        }
    }
}

impl CallConfig {
    /// Build a config, clamping limits and rejecting a zero timeout.
    pub fn bounded(
        max_tokens: u32,
        max_context: u32,
        temperature: f32,
        timeout: Duration,
    ) -> Result<Self> {
        if timeout.is_zero() {
            return Err(GenError::Configuration("timeout must be > 0".into()));
        }
        Ok(Self {
            max_tokens: max_tokens.min(MAX_TOKENS_CEILING),
            max_context: max_context.min(MAX_CONTEXT_CEILING),
            temperature,
            timeout,
        })
    }

    pub fn max_tokens(&self) -> u32 {
        self.max_tokens
    }

    pub fn max_context(&self) -> u32 {
        self.max_context
    }

    pub fn temperature(&self) -> f32 {
        self.temperature
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

/// Raw text returned by a backend, before validation.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderResponse {
    pub text: String,
    pub usage: Option<Usage>,
    /// Concrete model that served the call.
    pub model: String,
}

/// A generation backend.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Provider name for logging/debugging.
    fn name(&self) -> &str;

    /// Concrete model used when the caller did not pin one.
    fn model_name(&self) -> &str;

    /// Run one generation call.
    ///
    /// Report backend-side failures as [`GenError::Backend`] and unusable
    /// bodies (missing text field, not JSON) as [`GenError::ResponseShape`].
    /// Deadlines are enforced by [`call_with_deadline`].
    async fn call(&self, prompt: &str, model: &str, config: &CallConfig)
    -> Result<ProviderResponse>;

    /// Cheap, side-effect-free reachability check. Never fails; any
    /// problem reads as `false`.
    async fn is_available(&self) -> bool;
}

/// Run `provider.call` under `config.timeout()`.
///
/// On expiry the in-flight future is dropped, which releases the
/// underlying connection, and [`GenError::Timeout`] is returned.
pub async fn call_with_deadline(
    provider: &dyn Provider,
    prompt: &str,
    model: &str,
    config: &CallConfig,
) -> Result<ProviderResponse> {
    match tokio::time::timeout(config.timeout(), provider.call(prompt, model, config)).await {
        Ok(result) => result,
        Err(_) => Err(GenError::Timeout(config.timeout())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounded_clamps_to_ceilings() {
        let config =
            CallConfig::bounded(u32::MAX, u32::MAX, 0.5, Duration::from_secs(1)).unwrap();
        assert_eq!(config.max_tokens(), MAX_TOKENS_CEILING);
        assert_eq!(config.max_context(), MAX_CONTEXT_CEILING);
    }

    #[test]
    fn bounded_rejects_zero_timeout() {
        let err = CallConfig::bounded(10, 10, 0.0, Duration::ZERO).unwrap_err();
        assert!(matches!(err, GenError::Configuration(_)));
    }

    struct Sleepy;

    #[async_trait]
    impl Provider for Sleepy {
        fn name(&self) -> &str {
            "sleepy"
        }

        fn model_name(&self) -> &str {
            "sleepy-1"
        }

        async fn call(&self, _: &str, model: &str, _: &CallConfig) -> Result<ProviderResponse> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(ProviderResponse {
                text: String::new(),
                usage: None,
                model: model.to_owned(),
            })
        }

        async fn is_available(&self) -> bool {
            true
        }
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_reports_timeout() {
        let config = CallConfig::bounded(10, 10, 0.0, Duration::from_millis(50)).unwrap();
        let err = call_with_deadline(&Sleepy, "p", "m", &config)
            .await
            .unwrap_err();
        assert!(matches!(err, GenError::Timeout(d) if d == Duration::from_millis(50)));
    }
}
