//! Caching subsystem.
//!
//! - [`key::KeyDeriver`] turns a request's semantic identity (input,
//!   intent, model, pipeline tag) into a fixed-length [`CacheKey`]. The
//!   pipeline passes the provider-qualified concrete model.
//! - [`store::CacheStore`] holds validated results under those keys with
//!   LRU eviction and insertion-anchored TTL expiry.
//!
//! The store is memory-resident and owned per orchestrator instance. It is
//! rebuilt from misses after a restart and never shared across processes.

pub mod key;
pub mod store;

pub use key::{CacheKey, KeyDeriver, canonical_json};
pub use store::{CacheBackend, CacheConfig, CacheStats, CacheStore};
