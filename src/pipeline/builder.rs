//! Builder for configuring orchestrator instances.
//!
//! Providers are registered in a fixed priority order, which is the order
//! `auto` selection probes them in:
//!
//! 1. local (Ollama)
//! 2. cloud providers, in `cloud_preference` order
//! 3. custom providers added with [`OrchestratorBuilder::provider`]
//! 4. the mock, as a last resort

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use super::orchestrator::GenerationOrchestrator;
use crate::cache::{CacheBackend, CacheStore};
use crate::config::{CloudConfig, ConfigSource, OllamaConfig, RuntimeConfig, StaticConfig};
use crate::providers::{
    AnthropicProvider, Delay, MockProvider, ModelCatalog, ModelSpec, OllamaProvider,
    OpenAiProvider, Provider, ProviderRegistry, TokioDelay,
};
use crate::types::GenerationResult;
use crate::validate::OutputValidator;
use crate::{GenError, Result};

/// Default lifetime of memoised availability probes.
pub const DEFAULT_PROBE_CACHE_TTL: Duration = Duration::from_secs(10);

/// Builder for [`GenerationOrchestrator`].
///
/// ```rust,no_run
/// # use genpipe::{GenerationOrchestrator, GenerationRequest};
/// # async fn run() -> genpipe::Result<()> {
/// let pipeline = GenerationOrchestrator::builder()
///     .ollama("http://localhost:11434")
///     .mock()
///     .build()?;
///
/// let result = pipeline
///     .generate(&GenerationRequest::new("Q3 revenue by region", "dashboard", "small"))
///     .await?;
/// println!("{}", result.output);
/// # Ok(())
/// # }
/// ```
pub struct OrchestratorBuilder {
    ollama: Option<OllamaConfig>,
    openai: Option<(String, CloudConfig)>,
    anthropic: Option<(String, CloudConfig)>,
    cloud_preference: Vec<String>,
    custom: Vec<(String, Arc<dyn Provider>)>,
    mock: Option<Arc<MockProvider>>,
    default_provider: Option<String>,
    catalog: ModelCatalog,
    cache: Option<Arc<dyn CacheBackend<GenerationResult>>>,
    config: Arc<dyn ConfigSource>,
    delay: Arc<dyn Delay>,
    validator: OutputValidator,
    probe_cache_ttl: Option<Duration>,
}

impl Default for OrchestratorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl OrchestratorBuilder {
    pub fn new() -> Self {
        Self {
            ollama: None,
            openai: None,
            anthropic: None,
            cloud_preference: vec!["openai".into(), "anthropic".into()],
            custom: Vec::new(),
            mock: None,
            default_provider: None,
            catalog: ModelCatalog::with_embedded_seed(),
            cache: None,
            config: Arc::new(StaticConfig::default()),
            delay: Arc::new(TokioDelay),
            validator: OutputValidator::default(),
            probe_cache_ttl: Some(DEFAULT_PROBE_CACHE_TTL),
        }
    }

    /// Builder populated from `config`, reading API keys from the process
    /// environment.
    pub fn from_config(config: RuntimeConfig) -> Self {
        Self::from_config_with_env(config, |key| std::env::var(key).ok())
    }

    /// Like [`from_config`](Self::from_config) with an explicit variable
    /// lookup.
    ///
    /// A cloud section without a key is skipped with a warning. A named
    /// `provider` that ends up unregistered is rejected at
    /// [`build`](Self::build) time.
    pub fn from_config_with_env(
        config: RuntimeConfig,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Self {
        let mut builder = Self::new();
        builder.cloud_preference = config.providers.cloud_preference.clone();

        if let Some(ollama) = &config.providers.ollama {
            builder.ollama = Some(ollama.clone());
        }
        for (name, section) in [
            ("openai", &config.providers.openai),
            ("anthropic", &config.providers.anthropic),
        ] {
            let Some(section) = section else { continue };
            match config.api_key(name, &lookup) {
                Some(key) => {
                    let entry = Some((key, section.clone()));
                    if name == "openai" {
                        builder.openai = entry;
                    } else {
                        builder.anthropic = entry;
                    }
                }
                None => warn!(provider = name, "no API key found, provider not registered"),
            }
        }
        if config.providers.mock.enabled {
            builder = builder.mock();
        }
        builder.config = Arc::new(StaticConfig(config));
        builder
    }

    /// Register a local Ollama daemon.
    pub fn ollama(mut self, base_url: impl Into<String>) -> Self {
        self.ollama = Some(OllamaConfig {
            base_url: base_url.into(),
            default_model: None,
        });
        self
    }

    pub fn openai(mut self, api_key: impl Into<String>) -> Self {
        self.openai = Some((api_key.into(), CloudConfig::default()));
        self
    }

    pub fn anthropic(mut self, api_key: impl Into<String>) -> Self {
        self.anthropic = Some((api_key.into(), CloudConfig::default()));
        self
    }

    /// Register the default mock as last resort.
    pub fn mock(mut self) -> Self {
        self.mock = Some(Arc::new(MockProvider::new()));
        self
    }

    /// Register a specific mock (kept shared so tests can inspect it).
    pub fn mock_provider(mut self, mock: Arc<MockProvider>) -> Self {
        self.mock = Some(mock);
        self
    }

    /// Register any provider under `name`.
    pub fn provider(mut self, name: impl Into<String>, provider: Arc<dyn Provider>) -> Self {
        self.custom.push((name.into(), provider));
        self
    }

    /// Provider used when the configuration does not name one.
    pub fn default_provider(mut self, name: impl Into<String>) -> Self {
        self.default_provider = Some(name.into());
        self
    }

    /// Replace the whole model catalog.
    pub fn catalog(mut self, catalog: ModelCatalog) -> Self {
        self.catalog = catalog;
        self
    }

    /// Add or replace one catalog entry.
    pub fn model(mut self, spec: ModelSpec) -> Self {
        self.catalog.insert(spec);
        self
    }

    /// Use a custom cache backend instead of the in-memory store.
    pub fn cache(mut self, cache: Arc<dyn CacheBackend<GenerationResult>>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Fixed configuration.
    pub fn config(mut self, config: RuntimeConfig) -> Self {
        self.config = Arc::new(StaticConfig(config));
        self
    }

    /// Configuration re-read on every request.
    pub fn config_source(mut self, source: Arc<dyn ConfigSource>) -> Self {
        self.config = source;
        self
    }

    /// How to wait between retries. Default: [`TokioDelay`].
    pub fn delay(mut self, delay: Arc<dyn Delay>) -> Self {
        self.delay = delay;
        self
    }

    pub fn validator(mut self, validator: OutputValidator) -> Self {
        self.validator = validator;
        self
    }

    /// Memoise availability probes for `ttl`; `None` probes every time.
    pub fn probe_cache_ttl(mut self, ttl: Option<Duration>) -> Self {
        self.probe_cache_ttl = ttl;
        self
    }

    fn has_provider(&self) -> bool {
        self.ollama.is_some()
            || self.openai.is_some()
            || self.anthropic.is_some()
            || !self.custom.is_empty()
            || self.mock.is_some()
    }

    /// Build the orchestrator.
    pub fn build(self) -> Result<GenerationOrchestrator> {
        if !self.has_provider() {
            return Err(GenError::NoProvider);
        }

        let config = self.config.current().sanitized();
        let mut registry = ProviderRegistry::new();
        registry.set_probe_timeout(config.probe_timeout());
        registry.set_probe_cache_ttl(self.probe_cache_ttl);

        // Local first.
        if let Some(ollama) = &self.ollama {
            let mut provider = OllamaProvider::new(&ollama.base_url)?;
            if let Some(model) = &ollama.default_model {
                provider = provider.with_model(model);
            }
            registry.register("ollama", Arc::new(provider));
        }

        // Cloud, in preference order; any not listed follow in a fixed order.
        let mut cloud_order = self.cloud_preference.clone();
        for name in ["openai", "anthropic"] {
            if !cloud_order.iter().any(|n| n == name) {
                cloud_order.push(name.to_owned());
            }
        }
        for name in &cloud_order {
            match name.as_str() {
                "openai" => {
                    if let Some((key, section)) = &self.openai {
                        let mut provider = match &section.base_url {
                            Some(url) => OpenAiProvider::with_base_url(key, url)?,
                            None => OpenAiProvider::new(key)?,
                        };
                        if let Some(model) = &section.default_model {
                            provider = provider.with_model(model);
                        }
                        registry.register("openai", Arc::new(provider));
                    }
                }
                "anthropic" => {
                    if let Some((key, section)) = &self.anthropic {
                        let mut provider = match &section.base_url {
                            Some(url) => AnthropicProvider::with_base_url(key, url)?,
                            None => AnthropicProvider::new(key)?,
                        };
                        if let Some(model) = &section.default_model {
                            provider = provider.with_model(model);
                        }
                        registry.register("anthropic", Arc::new(provider));
                    }
                }
                other => debug!(provider = other, "ignoring unknown cloud preference"),
            }
        }

        for (name, provider) in self.custom {
            registry.register(name, provider);
        }

        // Mock last.
        if let Some(mock) = self.mock {
            registry.register("mock", mock);
        }

        if let Some(name) = &self.default_provider {
            registry.set_default(name)?;
        }
        if let Some(name) = config.provider.as_deref().map(str::trim) {
            if !name.is_empty()
                && name != crate::config::AUTO_PROVIDER
                && registry.resolve(Some(name)).is_err()
            {
                return Err(GenError::UnknownProvider(name.to_owned()));
            }
        }

        let cache = self
            .cache
            .unwrap_or_else(|| Arc::new(CacheStore::new(&config.cache_config())));

        debug!(providers = ?registry.names(), "orchestrator ready");
        Ok(GenerationOrchestrator {
            registry,
            catalog: self.catalog,
            cache,
            config: self.config,
            delay: self.delay,
            validator: self.validator,
        })
    }
}
