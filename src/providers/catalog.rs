//! Model catalog: which concrete models exist, per provider and size class.
//!
//! Logical selectors (`"small"`, `"large"`) are resolved here against a
//! memory budget, so the same request can land on a 1.2 GB model on a
//! laptop and a 5.6 GB one on a workstation. Cloud models carry
//! `memory_mb = 0` and always fit.
//!
//! The catalog ships with an embedded seed (see [`ModelCatalog::with_embedded_seed`]);
//! callers may add or replace entries at build time.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::types::{ModelSelector, ModelSize};
use crate::{GenError, Result};

/// One concrete model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelSpec {
    pub id: String,
    /// Registered provider name serving this model.
    pub provider: String,
    pub size: ModelSize,
    /// Resident memory needed to load the model. 0 for hosted models.
    #[serde(default)]
    pub memory_mb: u64,
    #[serde(default)]
    pub recommended: bool,
}

impl ModelSpec {
    pub fn new(id: impl Into<String>, provider: impl Into<String>, size: ModelSize) -> Self {
        Self {
            id: id.into(),
            provider: provider.into(),
            size,
            memory_mb: 0,
            recommended: false,
        }
    }

    pub fn memory_mb(mut self, mb: u64) -> Self {
        self.memory_mb = mb;
        self
    }

    pub fn recommended(mut self, yes: bool) -> Self {
        self.recommended = yes;
        self
    }
}

/// Known models.
#[derive(Debug, Clone, Default)]
pub struct ModelCatalog {
    models: Vec<ModelSpec>,
}

impl ModelCatalog {
    /// An empty catalog. Concrete model names are then passed through
    /// unchecked and logical sizes fall back to each provider's default.
    pub fn new() -> Self {
        Self::default()
    }

    /// A catalog pre-populated with the embedded seed.
    pub fn with_embedded_seed() -> Self {
        let mut catalog = Self::new();
        match serde_json::from_str::<Vec<ModelSpec>>(EMBEDDED_SEED) {
            Ok(models) => {
                for model in models {
                    catalog.insert(model);
                }
            }
            Err(e) => {
                // Compiled in and covered by tests; an empty catalog still works.
                warn!(error = %e, "failed to parse embedded model catalog");
            }
        }
        catalog
    }

    /// Insert a model, replacing any entry with the same id and provider.
    pub fn insert(&mut self, spec: ModelSpec) {
        match self
            .models
            .iter_mut()
            .find(|m| m.id == spec.id && m.provider == spec.provider)
        {
            Some(existing) => *existing = spec,
            None => self.models.push(spec),
        }
    }

    pub fn get(&self, id: &str) -> Option<&ModelSpec> {
        self.models.iter().find(|m| m.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    /// The entry for `id` as served by `provider`.
    pub fn get_for(&self, id: &str, provider: &str) -> Option<&ModelSpec> {
        self.models
            .iter()
            .find(|m| m.id == id && m.provider == provider)
    }

    pub fn has_provider(&self, provider: &str) -> bool {
        self.models.iter().any(|m| m.provider == provider)
    }

    pub fn list(&self) -> &[ModelSpec] {
        &self.models
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    /// Best model of `size` from `provider` that fits in `budget_mb`.
    ///
    /// Prefers recommended models, then the smaller footprint, then the id
    /// (so the choice is stable). Fails with [`GenError::NoModelAvailable`].
    pub fn select(&self, size: ModelSize, budget_mb: u64, provider: &str) -> Result<&ModelSpec> {
        self.models
            .iter()
            .filter(|m| m.provider == provider && m.size == size && m.memory_mb <= budget_mb)
            .min_by(|a, b| {
                b.recommended
                    .cmp(&a.recommended)
                    .then(a.memory_mb.cmp(&b.memory_mb))
                    .then_with(|| a.id.cmp(&b.id))
            })
            .ok_or(GenError::NoModelAvailable { size, budget_mb })
    }

    /// Turn a request's model selector into the concrete model to call.
    ///
    /// - Concrete names must be listed under `provider`. A provider with no
    ///   catalog entries at all (custom backends, or an empty catalog)
    ///   takes any name as given.
    /// - Logical sizes are resolved with [`select`](Self::select) when the
    ///   catalog lists models for `provider`; otherwise `provider_default`
    ///   is used.
    pub fn resolve(
        &self,
        selector: &ModelSelector,
        provider: &str,
        provider_default: &str,
        budget_mb: u64,
    ) -> Result<String> {
        match selector {
            ModelSelector::Concrete(id) => {
                if !self.has_provider(provider) || self.get_for(id, provider).is_some() {
                    Ok(id.clone())
                } else {
                    Err(GenError::ModelNotFound(id.clone()))
                }
            }
            ModelSelector::Logical(size) => {
                if self.has_provider(provider) {
                    self.select(*size, budget_mb, provider).map(|m| m.id.clone())
                } else {
                    Ok(provider_default.to_owned())
                }
            }
        }
    }
}

/// Raw JSON seed compiled into the binary.
const EMBEDDED_SEED: &str = include_str!("catalog.json");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedded_seed_parses() {
        let models: Vec<ModelSpec> = serde_json::from_str(EMBEDDED_SEED).unwrap();
        assert!(!models.is_empty());
        assert_eq!(ModelCatalog::with_embedded_seed().len(), models.len());
    }

    #[test]
    fn every_provider_has_both_sizes() {
        let catalog = ModelCatalog::with_embedded_seed();
        for provider in ["ollama", "openai", "anthropic", "mock"] {
            for size in [ModelSize::Small, ModelSize::Large] {
                assert!(
                    catalog.select(size, u64::MAX, provider).is_ok(),
                    "{provider} has no {size} model"
                );
            }
        }
    }

    #[test]
    fn insert_replaces_same_id_and_provider() {
        let mut catalog = ModelCatalog::new();
        catalog.insert(ModelSpec::new("m", "p", ModelSize::Small).memory_mb(10));
        catalog.insert(ModelSpec::new("m", "p", ModelSize::Small).memory_mb(20));
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog.get("m").unwrap().memory_mb, 20);
    }
}
