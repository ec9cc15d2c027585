//! genpipe - cached, validated UI generation over pluggable LLM backends
//!
//! A request `{input, intent, model}` goes through a deterministic cache,
//! then (on a miss) to a provider chosen by name or by availability, with
//! per-call deadlines and bounded retries. The raw output must pass a
//! strict shape contract before it is cached or returned. Nothing is
//! repaired or defaulted: invalid output is an error.
//!
//! # Example
//!
//! ```rust,no_run
//! use genpipe::{GenerationOrchestrator, GenerationRequest};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> genpipe::Result<()> {
//!     let pipeline = GenerationOrchestrator::builder()
//!         .ollama("http://localhost:11434")
//!         .mock()
//!         .build()?;
//!
//!     let request = GenerationRequest::new("Q3 revenue by region", "dashboard", "small");
//!     let result = pipeline.generate(&request).await?;
//!
//!     println!("{} via {}: {}", result.model, result.provider, result.output);
//!     Ok(())
//! }
//! ```
//!
//! # Structured input
//!
//! ```rust
//! use genpipe::{GenerationRequest, KeyDeriver};
//! use serde_json::json;
//!
//! let a = GenerationRequest::new(json!({"region": "EU", "quarter": 3}), "table", "large");
//! let b = GenerationRequest::new(json!({"quarter": 3, "region": "EU"}), "table", "large");
//!
//! let keys = KeyDeriver::new("v1");
//! assert_eq!(keys.derive(&a), keys.derive(&b));
//! ```

pub mod cache;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod providers;
pub mod telemetry;
pub mod types;
pub mod validate;
pub mod version;

// Re-export main types at crate root
pub use cache::{CacheBackend, CacheConfig, CacheKey, CacheStats, CacheStore, KeyDeriver};
pub use config::{ConfigSource, RuntimeConfig, SharedConfig, StaticConfig};
pub use error::{ErrorCategory, GenError, Result};
pub use pipeline::{GenerationOrchestrator, OrchestratorBuilder};
pub use providers::{
    CallConfig, MockOutcome, MockProvider, ModelCatalog, ModelSpec, Provider, ProviderRegistry,
    ProviderResponse, RetryConfig,
};
pub use types::{GenerationRequest, GenerationResult, Input, ModelSelector, ModelSize, Usage};
pub use validate::{OutputValidator, ValidatedOutput, ValidationError};
