//! Runtime configuration.
//!
//! Configuration is loaded from TOML with the following resolution order:
//! 1. `--config <path>` (CLI flag)
//! 2. `~/.genpipe/config.toml` (user)
//! 3. `/etc/genpipe/config.toml` (system)
//! 4. built-in defaults when no file exists
//!
//! Environment variables then override individual fields (`GENPIPE_MODEL`,
//! `GENPIPE_PROVIDER`, `GENPIPE_MAX_TOKENS`, `GENPIPE_CACHE_TTL_SECS`,
//! `GENPIPE_CACHE_MAX_SIZE`). Cloud API keys are read from
//! `OPENAI_API_KEY` / `ANTHROPIC_API_KEY` unless a section names another
//! variable.
//!
//! The orchestrator reads a [`ConfigSource`] on every request, so a
//! [`SharedConfig`] can be updated while the pipeline runs. Whatever the
//! source says, values are clamped to hard ceilings before anything uses
//! them. Adjustments are logged at `warn` once, when a configuration is
//! built or replaced; the per-request pass logs them at `debug`.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{Level, debug, warn};

use crate::cache::CacheConfig;
use crate::providers::{CallConfig, RetryConfig};
use crate::types::ModelSelector;
use crate::{GenError, Result};

/// Hard ceiling on tokens generated per call.
pub const MAX_TOKENS_CEILING: u32 = 8192;
/// Hard ceiling on the context window requested per call.
pub const MAX_CONTEXT_CEILING: u32 = 32_768;
/// Hard ceiling on cache entry lifetime (one day).
pub const CACHE_TTL_CEILING_SECS: u64 = 86_400;
/// Hard ceiling on cache entries.
pub const CACHE_MAX_SIZE_CEILING: usize = 10_000;
/// Hard ceiling on a single provider call.
pub const TIMEOUT_CEILING_MS: u64 = 120_000;
/// Hard ceiling on a single availability probe.
pub const PROBE_TIMEOUT_CEILING_MS: u64 = 10_000;
/// Hard ceiling on retries after the first attempt.
pub const RETRY_ATTEMPTS_CEILING: u32 = 5;
/// Hard ceiling on a single backoff delay.
pub const RETRY_DELAY_CEILING_MS: u64 = 60_000;

/// Provider setting that means "probe and take the first available".
pub const AUTO_PROVIDER: &str = "auto";

/// Full runtime configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Model selector used when a caller does not name one (default: "small").
    #[serde(default = "default_active_model")]
    pub active_model: String,
    /// Provider to use: a registered name, "auto", or unset for the
    /// registry default (falling back to "auto").
    #[serde(default)]
    pub provider: Option<String>,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_max_context")]
    pub max_context: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    /// Per-call deadline in milliseconds (default: 30000).
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Per-probe deadline in milliseconds (default: 1500).
    #[serde(default = "default_probe_timeout_ms")]
    pub probe_timeout_ms: u64,
    /// Memory available for local models (default: 8192 MB).
    #[serde(default = "default_memory_budget_mb")]
    pub memory_budget_mb: u64,
    /// Tag mixed into every cache key. Bump it to invalidate all entries
    /// after a prompt or contract change. Defaults to the crate version.
    #[serde(default)]
    pub pipeline_version: Option<String>,
    #[serde(default)]
    pub cache: CacheSection,
    #[serde(default)]
    pub retry: RetrySection,
    #[serde(default)]
    pub providers: ProvidersConfig,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            active_model: default_active_model(),
            provider: None,
            max_tokens: default_max_tokens(),
            max_context: default_max_context(),
            temperature: default_temperature(),
            timeout_ms: default_timeout_ms(),
            probe_timeout_ms: default_probe_timeout_ms(),
            memory_budget_mb: default_memory_budget_mb(),
            pipeline_version: None,
            cache: CacheSection::default(),
            retry: RetrySection::default(),
            providers: ProvidersConfig::default(),
        }
    }
}

fn default_active_model() -> String {
    "small".to_string()
}

fn default_max_tokens() -> u32 {
    1024
}

fn default_max_context() -> u32 {
    4096
}

fn default_temperature() -> f32 {
    0.2
}

fn default_timeout_ms() -> u64 {
    30_000
}

fn default_probe_timeout_ms() -> u64 {
    1_500
}

fn default_memory_budget_mb() -> u64 {
    8_192
}

/// `[cache]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheSection {
    /// Entry lifetime in seconds (default: 3600).
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,
    /// Maximum entries (default: 500).
    #[serde(default = "default_max_size")]
    pub max_size: usize,
}

impl Default for CacheSection {
    fn default() -> Self {
        Self {
            ttl_secs: default_ttl_secs(),
            max_size: default_max_size(),
        }
    }
}

fn default_ttl_secs() -> u64 {
    3600
}

fn default_max_size() -> usize {
    500
}

/// `[retry]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetrySection {
    /// Retries after the first attempt (default: 2).
    #[serde(default = "default_attempts")]
    pub attempts: u32,
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

impl Default for RetrySection {
    fn default() -> Self {
        Self {
            attempts: default_attempts(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

fn default_attempts() -> u32 {
    2
}

fn default_base_delay_ms() -> u64 {
    250
}

fn default_max_delay_ms() -> u64 {
    5_000
}

/// `[providers.*]`
///
/// Sections that are present register the provider. The mock is
/// registered last, as a last resort, unless `[providers.mock]` sets
/// `enabled = false`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProvidersConfig {
    #[serde(default)]
    pub ollama: Option<OllamaConfig>,
    #[serde(default)]
    pub openai: Option<CloudConfig>,
    #[serde(default)]
    pub anthropic: Option<CloudConfig>,
    #[serde(default)]
    pub mock: MockConfig,
    /// Cloud providers in preference order (default: openai, anthropic).
    #[serde(default = "default_cloud_preference")]
    pub cloud_preference: Vec<String>,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            ollama: None,
            openai: None,
            anthropic: None,
            mock: MockConfig::default(),
            cloud_preference: default_cloud_preference(),
        }
    }
}

fn default_cloud_preference() -> Vec<String> {
    vec!["openai".to_string(), "anthropic".to_string()]
}

/// `[providers.ollama]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OllamaConfig {
    /// Daemon URL (default: http://localhost:11434).
    #[serde(default = "default_ollama_url")]
    pub base_url: String,
    /// Model used when the catalog has none for a size class.
    #[serde(default)]
    pub default_model: Option<String>,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            base_url: default_ollama_url(),
            default_model: None,
        }
    }
}

fn default_ollama_url() -> String {
    crate::providers::ollama::DEFAULT_BASE_URL.to_string()
}

/// `[providers.openai]` / `[providers.anthropic]`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CloudConfig {
    /// Override the API base URL (proxies, compatible servers).
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub default_model: Option<String>,
    /// Environment variable holding the key. Defaults per provider.
    #[serde(default)]
    pub api_key_env: Option<String>,
}

/// `[providers.mock]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MockConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

fn default_true() -> bool {
    true
}

/// Provider name → default API key variable.
const PROVIDER_ENV_VARS: &[(&str, &str)] = &[
    ("openai", "OPENAI_API_KEY"),
    ("anthropic", "ANTHROPIC_API_KEY"),
];

/// How the orchestrator should pick a provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderSelection {
    /// The registry default, or best-available if none is set.
    Default,
    /// Probe in priority order.
    BestAvailable,
    /// A specific registered provider.
    Named(String),
}

impl RuntimeConfig {
    /// Load configuration from the standard locations, then apply
    /// environment overrides.
    ///
    /// An explicit path that does not exist is an error; missing default
    /// locations are not.
    pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
        let mut config = match Self::resolve_config_path(explicit_path)? {
            Some(path) => Self::from_file(&path)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Parse a single TOML file. No environment overrides.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            GenError::Configuration(format!("Failed to read config file {path:?}: {e}"))
        })?;
        toml::from_str(&content).map_err(|e| {
            GenError::Configuration(format!("Failed to parse config file {path:?}: {e}"))
        })
    }

    fn resolve_config_path(explicit: Option<&Path>) -> Result<Option<PathBuf>> {
        if let Some(path) = explicit {
            if path.exists() {
                return Ok(Some(path.to_path_buf()));
            }
            return Err(GenError::Configuration(format!(
                "Config file not found: {path:?}"
            )));
        }

        // User config
        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".genpipe").join("config.toml");
            if user_config.exists() {
                return Ok(Some(user_config));
            }
        }

        // System config
        let system_config = PathBuf::from("/etc/genpipe/config.toml");
        if system_config.exists() {
            return Ok(Some(system_config));
        }

        Ok(None)
    }

    /// Apply `GENPIPE_*` overrides read through `lookup`.
    ///
    /// Unparseable numbers are ignored with a warning.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(model) = lookup("GENPIPE_MODEL") {
            self.active_model = model;
        }
        if let Some(provider) = lookup("GENPIPE_PROVIDER") {
            self.provider = Some(provider);
        }
        if let Some(n) = parse_env(&lookup, "GENPIPE_MAX_TOKENS") {
            self.max_tokens = n;
        }
        if let Some(n) = parse_env(&lookup, "GENPIPE_CACHE_TTL_SECS") {
            self.cache.ttl_secs = n;
        }
        if let Some(n) = parse_env(&lookup, "GENPIPE_CACHE_MAX_SIZE") {
            self.cache.max_size = n;
        }
    }

    /// A copy with every limit clamped to its ceiling and every zero
    /// deadline replaced by its default. Logs each adjustment at `warn`.
    pub fn sanitized(&self) -> Self {
        self.sanitize(Level::WARN)
    }

    /// As [`sanitized`](Self::sanitized), logging at `debug`. Used on the
    /// request path, where the same adjustment would otherwise repeat on
    /// every call.
    pub fn sanitized_quietly(&self) -> Self {
        self.sanitize(Level::DEBUG)
    }

    fn sanitize(&self, level: Level) -> Self {
        let mut c = self.clone();
        c.max_tokens = clamp_nonzero(
            level,
            "max_tokens",
            c.max_tokens,
            MAX_TOKENS_CEILING,
            default_max_tokens(),
        );
        c.max_context = clamp_nonzero(
            level,
            "max_context",
            c.max_context,
            MAX_CONTEXT_CEILING,
            default_max_context(),
        );
        c.timeout_ms = clamp_nonzero(
            level,
            "timeout_ms",
            c.timeout_ms,
            TIMEOUT_CEILING_MS,
            default_timeout_ms(),
        );
        c.probe_timeout_ms = clamp_nonzero(
            level,
            "probe_timeout_ms",
            c.probe_timeout_ms,
            PROBE_TIMEOUT_CEILING_MS,
            default_probe_timeout_ms(),
        );
        c.cache.ttl_secs = clamp(level, "cache.ttl_secs", c.cache.ttl_secs, CACHE_TTL_CEILING_SECS);
        c.cache.max_size = clamp(level, "cache.max_size", c.cache.max_size, CACHE_MAX_SIZE_CEILING);
        c.retry.attempts = clamp(level, "retry.attempts", c.retry.attempts, RETRY_ATTEMPTS_CEILING);
        c.retry.base_delay_ms = clamp(
            level,
            "retry.base_delay_ms",
            c.retry.base_delay_ms,
            RETRY_DELAY_CEILING_MS,
        );
        c.retry.max_delay_ms = clamp(
            level,
            "retry.max_delay_ms",
            c.retry.max_delay_ms,
            RETRY_DELAY_CEILING_MS,
        );

        if !c.temperature.is_finite() || !(0.0..=2.0).contains(&c.temperature) {
            let fixed = if c.temperature.is_finite() {
                c.temperature.clamp(0.0, 2.0)
            } else {
                default_temperature()
            };
            if level == Level::WARN {
                warn!(value = c.temperature, using = fixed, "temperature out of range");
            } else {
                debug!(value = c.temperature, using = fixed, "temperature out of range");
            }
            c.temperature = fixed;
        }
        c
    }

    /// The model selector to use when a caller does not supply one.
    pub fn active_selector(&self) -> ModelSelector {
        ModelSelector::from(self.active_model.as_str())
    }

    pub fn pipeline_tag(&self) -> String {
        self.pipeline_version
            .clone()
            .unwrap_or_else(crate::version::default_pipeline_tag)
    }

    pub fn provider_selection(&self) -> ProviderSelection {
        match self.provider.as_deref().map(str::trim) {
            None | Some("") => ProviderSelection::Default,
            Some(AUTO_PROVIDER) => ProviderSelection::BestAvailable,
            Some(name) => ProviderSelection::Named(name.to_owned()),
        }
    }

    pub fn cache_config(&self) -> CacheConfig {
        CacheConfig::new()
            .max_size(self.cache.max_size)
            .ttl(Duration::from_secs(self.cache.ttl_secs))
    }

    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig::new()
            .retry_attempts(self.retry.attempts)
            .base_delay(Duration::from_millis(self.retry.base_delay_ms))
            .max_delay(Duration::from_millis(self.retry.max_delay_ms))
    }

    pub fn call_config(&self) -> Result<CallConfig> {
        CallConfig::bounded(
            self.max_tokens,
            self.max_context,
            self.temperature,
            Duration::from_millis(self.timeout_ms),
        )
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    /// Resolve the API key for a cloud provider from its configured (or
    /// default) environment variable. Empty values read as absent.
    pub fn api_key(
        &self,
        provider: &str,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Option<String> {
        let section = match provider {
            "openai" => self.providers.openai.as_ref(),
            "anthropic" => self.providers.anthropic.as_ref(),
            _ => None,
        };
        let var = section
            .and_then(|s| s.api_key_env.clone())
            .or_else(|| {
                PROVIDER_ENV_VARS
                    .iter()
                    .find(|(name, _)| *name == provider)
                    .map(|(_, var)| (*var).to_string())
            })?;
        lookup(&var).filter(|key| !key.trim().is_empty())
    }
}

fn parse_env<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Option<T> {
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(key, value = %raw, "ignoring unparseable environment override");
            None
        }
    }
}

fn clamp<T: PartialOrd + Copy + std::fmt::Display>(
    level: Level,
    field: &str,
    value: T,
    ceiling: T,
) -> T {
    if value > ceiling {
        if level == Level::WARN {
            warn!(field, value = %value, ceiling = %ceiling, "clamping to ceiling");
        } else {
            debug!(field, value = %value, ceiling = %ceiling, "clamping to ceiling");
        }
        ceiling
    } else {
        value
    }
}

fn clamp_nonzero<T: PartialOrd + Copy + Default + std::fmt::Display>(
    level: Level,
    field: &str,
    value: T,
    ceiling: T,
    fallback: T,
) -> T {
    if value == T::default() {
        if level == Level::WARN {
            warn!(field, using = %fallback, "zero is not allowed, using default");
        } else {
            debug!(field, using = %fallback, "zero is not allowed, using default");
        }
        return fallback;
    }
    clamp(level, field, value, ceiling)
}

/// Where the orchestrator reads its configuration from, once per request.
pub trait ConfigSource: Send + Sync {
    fn current(&self) -> RuntimeConfig;
}

impl ConfigSource for RuntimeConfig {
    fn current(&self) -> RuntimeConfig {
        self.clone()
    }
}

/// A configuration fixed at construction.
#[derive(Debug, Clone, Default)]
pub struct StaticConfig(pub RuntimeConfig);

impl ConfigSource for StaticConfig {
    fn current(&self) -> RuntimeConfig {
        self.0.clone()
    }
}

/// Configuration that can be replaced while the pipeline is running.
///
/// Clones share the same underlying value. Values are clamped when they
/// are stored, so adjustments are reported once per change.
#[derive(Debug, Clone, Default)]
pub struct SharedConfig {
    inner: Arc<RwLock<RuntimeConfig>>,
}

impl SharedConfig {
    pub fn new(config: RuntimeConfig) -> Self {
        Self {
            inner: Arc::new(RwLock::new(config.sanitized())),
        }
    }

    /// Replace the configuration. Takes effect on the next request.
    pub fn update(&self, config: RuntimeConfig) {
        let config = config.sanitized();
        match self.inner.write() {
            Ok(mut guard) => *guard = config,
            Err(poisoned) => *poisoned.into_inner() = config,
        }
    }

    /// Edit the configuration in place.
    pub fn modify(&self, f: impl FnOnce(&mut RuntimeConfig)) {
        let edit = |config: &mut RuntimeConfig| {
            f(config);
            *config = config.sanitized();
        };
        match self.inner.write() {
            Ok(mut guard) => edit(&mut *guard),
            Err(poisoned) => edit(&mut *poisoned.into_inner()),
        }
    }
}

impl ConfigSource for SharedConfig {
    fn current(&self) -> RuntimeConfig {
        match self.inner.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_selection_variants() {
        let mut config = RuntimeConfig::default();
        assert_eq!(config.provider_selection(), ProviderSelection::Default);
        config.provider = Some("auto".into());
        assert_eq!(config.provider_selection(), ProviderSelection::BestAvailable);
        config.provider = Some(" ollama ".into());
        assert_eq!(
            config.provider_selection(),
            ProviderSelection::Named("ollama".into())
        );
    }

    #[test]
    fn clamp_nonzero_uses_fallback() {
        assert_eq!(clamp_nonzero(Level::WARN, "x", 0u64, 10, 5), 5);
        assert_eq!(clamp_nonzero(Level::WARN, "x", 50u64, 10, 5), 10);
        assert_eq!(clamp_nonzero(Level::DEBUG, "x", 7u64, 10, 5), 7);
    }

    #[test]
    fn quiet_and_loud_passes_agree() {
        let config = RuntimeConfig {
            max_tokens: 0,
            max_context: u32::MAX,
            temperature: -1.0,
            ..RuntimeConfig::default()
        };
        assert_eq!(config.sanitized(), config.sanitized_quietly());
    }

    #[test]
    fn nan_temperature_reset() {
        let config = RuntimeConfig {
            temperature: f32::NAN,
            ..RuntimeConfig::default()
        };
        assert_eq!(config.sanitized().temperature, default_temperature());
    }
}
