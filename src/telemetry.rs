//! Telemetry metric name constants.
//!
//! Consumers install their own `metrics` recorder (e.g. prometheus,
//! statsd); without a recorder installed, all metric calls are no-ops.
//!
//! # Metric naming conventions
//!
//! All metrics are prefixed with `genpipe_`. Counters end in `_total`,
//! histograms use meaningful units (e.g. `_seconds`).
//!
//! # Common labels
//!
//! - `provider`: registered provider name (e.g. "ollama", "mock")
//! - `status`: outcome, "ok" or "error"
//! - `direction`: token direction, "prompt" or "completion"

/// Generation requests handled by the orchestrator, cache hits included.
///
/// Labels: `status` ("ok" | "error"), `source` ("cache" | "provider").
pub const REQUESTS_TOTAL: &str = "genpipe_requests_total";

/// End-to-end `generate` duration in seconds.
///
/// Labels: `source`.
pub const REQUEST_DURATION_SECONDS: &str = "genpipe_request_duration_seconds";

/// Retry attempts (not counting the initial call).
///
/// Labels: `provider`.
pub const RETRIES_TOTAL: &str = "genpipe_retries_total";

/// Tokens reported by providers.
///
/// Labels: `provider`, `direction` ("prompt" | "completion").
pub const TOKENS_TOTAL: &str = "genpipe_tokens_total";

/// Cache lookups that returned a live entry.
pub const CACHE_HITS_TOTAL: &str = "genpipe_cache_hits_total";

/// Cache lookups that found nothing or an expired entry.
pub const CACHE_MISSES_TOTAL: &str = "genpipe_cache_misses_total";

/// Entries dropped to honour the size bound.
pub const CACHE_EVICTIONS_TOTAL: &str = "genpipe_cache_evictions_total";

/// Provider outputs rejected by the output contract.
///
/// Labels: `provider`, `field` (contract field, or "root").
pub const VALIDATION_FAILURES_TOTAL: &str = "genpipe_validation_failures_total";

/// Availability probes actually sent (memoised answers are not counted).
///
/// Labels: `provider`, `status` ("up" | "down").
pub const PROBES_TOTAL: &str = "genpipe_probes_total";
