//! Generation backends and the machinery around them.
//!
//! - [`traits`]: the [`Provider`] trait, [`CallConfig`] and deadlines
//! - [`retry`]: bounded exponential-backoff retry loop
//! - [`registry`]: named lookup and availability probing
//! - [`catalog`]: logical size to concrete model resolution
//! - [`ollama`], [`openai`], [`anthropic`]: HTTP backends
//! - [`mock`]: deterministic in-process backend

pub mod anthropic;
pub mod catalog;
mod http;
pub mod mock;
pub mod ollama;
pub mod openai;
pub mod registry;
pub mod retry;
pub mod traits;

pub use anthropic::AnthropicProvider;
pub use catalog::{ModelCatalog, ModelSpec};
pub use mock::{MockOutcome, MockProvider};
pub use ollama::OllamaProvider;
pub use openai::OpenAiProvider;
pub use registry::ProviderRegistry;
pub use retry::{Delay, NoDelay, RetryConfig, TokioDelay, with_retry};
pub use traits::{CallConfig, Provider, ProviderResponse, call_with_deadline};
