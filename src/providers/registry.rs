//! Provider registry: named lookup plus priority-ordered availability probing.
//!
//! Providers are stored under a name and in priority order (index 0 =
//! highest). Two ways to pick one:
//!
//! - [`ProviderRegistry::resolve`] returns a provider by name, or the
//!   configured default when no name is given.
//! - [`ProviderRegistry::resolve_best_available`] probes providers in
//!   priority order and returns the first that answers.
//!
//! ```text
//!  resolve_best_available()
//!          │ probe in order (each bounded by probe_timeout)
//!          ▼
//!  ┌────────────┐ unavailable ┌────────────┐ unavailable ┌────────────┐
//!  │  ollama    │ ──────────► │  openai    │ ──────────► │   mock     │
//!  │ (local)    │             │ (cloud)    │             │ (last)     │
//!  └────────────┘             └────────────┘             └────────────┘
//! ```
//!
//! Probe results may be memoised for a short TTL so a busy pipeline does
//! not hit `/api/tags` on every request.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use tracing::{debug, instrument};

use super::traits::Provider;
use crate::telemetry;
use crate::{GenError, Result};

/// Default bound on a single availability probe.
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_millis(1500);

/// Named providers in priority order.
pub struct ProviderRegistry {
    providers: HashMap<String, Arc<dyn Provider>>,
    order: Vec<String>,
    default: Option<String>,
    probe_timeout: Duration,
    probe_cache: Option<Cache<String, bool>>,
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self {
            providers: HashMap::new(),
            order: Vec::new(),
            default: None,
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
            probe_cache: None,
        }
    }
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `provider` under `name`.
    ///
    /// New names go to the end of the priority order. Re-registering a
    /// name replaces the provider and keeps its position.
    pub fn register(&mut self, name: impl Into<String>, provider: Arc<dyn Provider>) {
        let name = name.into();
        if self.providers.insert(name.clone(), provider).is_none() {
            self.order.push(name);
        } else {
            debug!(provider = %name, "replaced registered provider");
        }
    }

    /// Make `name` the provider returned by `resolve(None)`.
    pub fn set_default(&mut self, name: &str) -> Result<()> {
        if !self.providers.contains_key(name) {
            return Err(GenError::UnknownProvider(name.to_owned()));
        }
        self.default = Some(name.to_owned());
        Ok(())
    }

    pub fn default_name(&self) -> Option<&str> {
        self.default.as_deref()
    }

    /// Move `name` to the front of the priority order. Unknown names are
    /// ignored; the others keep their relative order.
    pub fn prefer(&mut self, name: &str) {
        if let Some(pos) = self.order.iter().position(|n| n == name) {
            let entry = self.order.remove(pos);
            self.order.insert(0, entry);
        }
    }

    /// Bound on each availability probe. Default: 1.5s.
    pub fn set_probe_timeout(&mut self, timeout: Duration) {
        self.probe_timeout = timeout;
    }

    /// Memoise probe results for `ttl`. `None` disables memoisation.
    pub fn set_probe_cache_ttl(&mut self, ttl: Option<Duration>) {
        self.probe_cache = ttl.map(|ttl| {
            Cache::builder()
                .max_capacity(64)
                .time_to_live(ttl)
                .build()
        });
    }

    /// Names in priority order.
    pub fn names(&self) -> Vec<&str> {
        self.order.iter().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Look up a provider by name, or the default when `name` is `None`.
    ///
    /// Fails with [`GenError::UnknownProvider`] for an unregistered name and
    /// [`GenError::NoProvider`] when no name is given and no default is set.
    pub fn resolve(&self, name: Option<&str>) -> Result<Arc<dyn Provider>> {
        let name = match name {
            Some(name) => name,
            None => self.default.as_deref().ok_or(GenError::NoProvider)?,
        };
        self.providers
            .get(name)
            .cloned()
            .ok_or_else(|| GenError::UnknownProvider(name.to_owned()))
    }

    /// First provider, in priority order, whose probe succeeds.
    ///
    /// Returns its registered name alongside it. Fails with
    /// [`GenError::NoProvider`] when every probe fails or times out.
    #[instrument(skip(self), fields(candidates = self.order.len()))]
    pub async fn resolve_best_available(&self) -> Result<(String, Arc<dyn Provider>)> {
        for name in &self.order {
            let Some(provider) = self.providers.get(name) else {
                continue;
            };
            if self.probe(name, provider.as_ref()).await {
                debug!(provider = %name, "selected available provider");
                return Ok((name.clone(), Arc::clone(provider)));
            }
            debug!(provider = %name, "provider unavailable, trying next");
        }
        Err(GenError::NoProvider)
    }

    async fn probe(&self, name: &str, provider: &dyn Provider) -> bool {
        if let Some(cache) = &self.probe_cache {
            if let Some(available) = cache.get(name).await {
                return available;
            }
        }

        let available = tokio::time::timeout(self.probe_timeout, provider.is_available())
            .await
            .unwrap_or(false);

        metrics::counter!(telemetry::PROBES_TOTAL,
            "provider" => name.to_owned(),
            "status" => if available { "up" } else { "down" },
        )
        .increment(1);

        if let Some(cache) = &self.probe_cache {
            cache.insert(name.to_owned(), available).await;
        }
        available
    }
}
