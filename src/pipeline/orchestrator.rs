//! The generation pipeline.
//!
//! ```text
//! generate(request)
//!   │ validate request, read config
//!   ▼
//! select provider ──► resolve model ──► derive key
//!   │
//!   ▼
//! cache hit? ──yes──► return cached result
//!   │ no (or cache error, logged)
//!   ▼
//! compose prompt ──► retry loop { call under deadline }
//!   │                 transient errors retried
//!   │
//!   ▼
//! validate output ──fail──► error, nothing cached
//!   │ ok
//!   ▼
//! cache set (failure logged) ──► return result
//! ```
//!
//! The orchestrator holds no per-request state, so one instance can serve
//! any number of concurrent callers. Two concurrent misses on the same key
//! both reach the provider; the later write wins.
//!
//! Keys carry the provider and concrete model a request dispatches to, so
//! output from a stand-in backend (the mock, or whichever provider answered
//! while the preferred one was down) is never served once the request
//! routes elsewhere.

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, instrument, warn};

use super::builder::OrchestratorBuilder;
use super::prompt;
use crate::cache::{CacheBackend, CacheKey, CacheStats, KeyDeriver};
use crate::config::{ConfigSource, ProviderSelection, RuntimeConfig};
use crate::providers::{
    Delay, ModelCatalog, Provider, ProviderRegistry, call_with_deadline, with_retry,
};
use crate::telemetry;
use crate::types::{GenerationRequest, GenerationResult, ModelSelector};
use crate::validate::OutputValidator;
use crate::{GenError, Result};

/// Where a request goes, and the cache key that follows from it.
struct Route {
    provider_name: String,
    provider: Arc<dyn Provider>,
    model: String,
    key: CacheKey,
}

/// Runs requests through cache, provider and validator.
pub struct GenerationOrchestrator {
    pub(super) registry: ProviderRegistry,
    pub(super) catalog: ModelCatalog,
    pub(super) cache: Arc<dyn CacheBackend<GenerationResult>>,
    pub(super) config: Arc<dyn ConfigSource>,
    pub(super) delay: Arc<dyn Delay>,
    pub(super) validator: OutputValidator,
}

impl GenerationOrchestrator {
    pub fn builder() -> OrchestratorBuilder {
        OrchestratorBuilder::new()
    }

    /// Build an orchestrator from a loaded configuration, reading API keys
    /// from the environment.
    pub fn from_config(config: RuntimeConfig) -> Result<Self> {
        OrchestratorBuilder::from_config(config).build()
    }

    /// Produce a validated result for `request`, from cache when possible.
    ///
    /// Only validated results are ever cached. A cache that errors is
    /// bypassed, never fatal.
    #[instrument(skip(self, request), fields(intent = %request.intent, model = %request.model))]
    pub async fn generate(&self, request: &GenerationRequest) -> Result<GenerationResult> {
        let start = Instant::now();
        let outcome = self.run(request).await;
        match &outcome {
            Ok((_, source)) => Self::record_request(source, start, true),
            Err(e) => {
                debug!(error = %e, category = ?e.category(), "generation failed");
                Self::record_request("provider", start, false);
            }
        }
        outcome.map(|(result, _)| result)
    }

    /// A request for `input` and `intent` using the configured active model.
    pub fn request(
        &self,
        input: impl Into<crate::types::Input>,
        intent: impl Into<String>,
    ) -> GenerationRequest {
        GenerationRequest::new(input, intent, self.config.current().active_selector())
    }

    async fn run(&self, request: &GenerationRequest) -> Result<(GenerationResult, &'static str)> {
        request.validate()?;
        let config = self.config.current().sanitized_quietly();
        let Route {
            provider_name,
            provider,
            model,
            key,
        } = self.route(request, &config).await?;

        if let Err(e) = self.cache.reconfigure(&config.cache_config()) {
            warn!(error = %e, "failed to apply cache limits");
        }
        match self.cache.get(&key) {
            Ok(Some(hit)) => {
                debug!(key = %key, "cache hit");
                return Ok((hit, "cache"));
            }
            Ok(None) => debug!(key = %key, "cache miss"),
            Err(e) => warn!(error = %e, "cache lookup failed, treating as miss"),
        }
        debug!(provider = %provider_name, model = %model, "dispatching");

        let prompt = prompt::compose(&request.intent, &request.input);
        let call = config.call_config()?;
        let retry = config.retry_config();
        let response = with_retry(&retry, self.delay.as_ref(), &provider_name, || {
            call_with_deadline(provider.as_ref(), &prompt, &model, &call)
        })
        .await?;

        let validated = self
            .validator
            .validate(response.text.as_str())
            .map_err(|e| {
                metrics::counter!(telemetry::VALIDATION_FAILURES_TOTAL,
                    "provider" => provider_name.clone(),
                    "field" => e.field().unwrap_or("root"),
                )
                .increment(1);
                warn!(provider = %provider_name, error = %e, "provider output rejected");
                GenError::from(e)
            })?;

        if let Some(usage) = &response.usage {
            metrics::counter!(telemetry::TOKENS_TOTAL,
                "provider" => provider_name.clone(),
                "direction" => "prompt",
            )
            .increment(u64::from(usage.prompt_tokens));
            metrics::counter!(telemetry::TOKENS_TOTAL,
                "provider" => provider_name.clone(),
                "direction" => "completion",
            )
            .increment(u64::from(usage.completion_tokens));
        }

        let result = GenerationResult {
            output: validated.into_value(),
            usage: response.usage,
            model: response.model,
            provider: provider_name,
        };

        if let Err(e) = self.cache.set(key, result.clone()) {
            warn!(error = %e, "cache write failed, returning uncached result");
        }
        Ok((result, "provider"))
    }

    /// Pick the provider, resolve the model on it and derive the key.
    async fn route(&self, request: &GenerationRequest, config: &RuntimeConfig) -> Result<Route> {
        let (provider_name, provider) = self.select_provider(config).await?;
        let model = self.catalog.resolve(
            &request.model,
            &provider_name,
            provider.model_name(),
            config.memory_budget_mb,
        )?;
        let key = KeyDeriver::new(config.pipeline_tag())
            .derive_for_model(request, &format!("{provider_name}/{model}"));
        Ok(Route {
            provider_name,
            provider,
            model,
            key,
        })
    }

    async fn select_provider(
        &self,
        config: &RuntimeConfig,
    ) -> Result<(String, Arc<dyn Provider>)> {
        match config.provider_selection() {
            ProviderSelection::Named(name) => {
                let provider = self.registry.resolve(Some(&name))?;
                Ok((name, provider))
            }
            ProviderSelection::Default => match self.registry.default_name() {
                Some(name) => Ok((name.to_owned(), self.registry.resolve(None)?)),
                None => self.registry.resolve_best_available().await,
            },
            ProviderSelection::BestAvailable => self.registry.resolve_best_available().await,
        }
    }

    /// Drop the cached result for `request` on the provider it currently
    /// routes to, if any.
    pub async fn invalidate(&self, request: &GenerationRequest) -> Result<()> {
        let key = self.key_for(request).await?;
        self.cache.invalidate(&key)
    }

    /// Drop every cached result and reset the counters.
    pub fn clear_cache(&self) -> Result<()> {
        self.cache.clear()
    }

    pub fn cache_stats(&self) -> Result<CacheStats> {
        self.cache.stats()
    }

    /// The cache key `request` maps to under the current configuration.
    ///
    /// Selects a provider the same way [`generate`](Self::generate) does,
    /// so it may probe.
    pub async fn key_for(&self, request: &GenerationRequest) -> Result<CacheKey> {
        let config = self.config.current().sanitized_quietly();
        Ok(self.route(request, &config).await?.key)
    }

    /// Concrete model a selector would resolve to on `provider`, without
    /// calling it.
    pub fn resolve_model(&self, selector: &ModelSelector, provider: &str) -> Result<String> {
        let config = self.config.current().sanitized_quietly();
        let resolved = self.registry.resolve(Some(provider))?;
        self.catalog.resolve(
            selector,
            provider,
            resolved.model_name(),
            config.memory_budget_mb,
        )
    }

    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    pub fn catalog(&self) -> &ModelCatalog {
        &self.catalog
    }

    fn record_request(source: &'static str, start: Instant, ok: bool) {
        let status = if ok { "ok" } else { "error" };
        metrics::counter!(telemetry::REQUESTS_TOTAL,
            "status" => status,
            "source" => source,
        )
        .increment(1);
        metrics::histogram!(telemetry::REQUEST_DURATION_SECONDS,
            "source" => source,
        )
        .record(start.elapsed().as_secs_f64());
    }
}
