//! Tests for metrics emitted by the pipeline.
//!
//! Uses `metrics_util::debugging::DebuggingRecorder` to capture and assert
//! on emitted metrics without needing a real exporter.

use std::sync::Arc;

use metrics_util::MetricKind;
use metrics_util::debugging::{DebugValue, DebuggingRecorder};

use genpipe::providers::NoDelay;
use genpipe::telemetry;
use genpipe::{
    GenerationOrchestrator, GenerationRequest, GenerationResult, MockOutcome, MockProvider, Result,
};

// ============================================================================
// Snapshot type alias for readability
// ============================================================================

type SnapshotVec = Vec<(
    metrics_util::CompositeKey,
    Option<metrics::Unit>,
    Option<metrics::SharedString>,
    DebugValue,
)>;

// ============================================================================
// Helpers
// ============================================================================

/// Sum counter values matching `name` and every `(label, value)` pair.
fn counter_total(snapshot: &SnapshotVec, name: &str, labels: &[(&str, &str)]) -> u64 {
    snapshot
        .iter()
        .filter(|(key, _, _, _)| key.kind() == MetricKind::Counter && key.key().name() == name)
        .filter(|(key, _, _, _)| {
            labels.iter().all(|(k, v)| {
                key.key()
                    .labels()
                    .any(|label| label.key() == *k && label.value() == *v)
            })
        })
        .map(|(_, _, _, value)| match value {
            DebugValue::Counter(v) => *v,
            _ => 0,
        })
        .sum()
}

fn has_histogram(snapshot: &SnapshotVec, name: &str) -> bool {
    snapshot
        .iter()
        .any(|(key, _, _, _)| key.kind() == MetricKind::Histogram && key.key().name() == name)
}

fn pipeline(mock: MockProvider) -> GenerationOrchestrator {
    GenerationOrchestrator::builder()
        .mock_provider(Arc::new(mock))
        .delay(Arc::new(NoDelay))
        .probe_cache_ttl(None)
        .build()
        .unwrap()
}

/// Run `requests` through a fresh pipeline under a local recorder.
///
/// `block_in_place` keeps the sync `with_local_recorder` closure on the
/// current thread while `block_on` drives the async work.
fn record(mock: MockProvider, requests: usize) -> (SnapshotVec, Vec<Result<GenerationResult>>) {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();

    let results = metrics::with_local_recorder(&recorder, || {
        tokio::task::block_in_place(|| {
            tokio::runtime::Handle::current().block_on(async {
                let pipeline = pipeline(mock);
                let request = GenerationRequest::new("x", "y", "small");
                let mut results = Vec::new();
                for _ in 0..requests {
                    results.push(pipeline.generate(&request).await);
                }
                results
            })
        })
    });

    (snapshotter.snapshot().into_vec(), results)
}

// ============================================================================
// Tests
// ============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
async fn miss_then_hit_records_both_sources() {
    let (snapshot, results) = record(MockProvider::new(), 2);
    assert!(results.iter().all(|r| r.is_ok()));

    assert_eq!(counter_total(&snapshot, telemetry::CACHE_MISSES_TOTAL, &[]), 1);
    assert_eq!(counter_total(&snapshot, telemetry::CACHE_HITS_TOTAL, &[]), 1);
    assert_eq!(
        counter_total(
            &snapshot,
            telemetry::REQUESTS_TOTAL,
            &[("status", "ok"), ("source", "provider")]
        ),
        1
    );
    assert_eq!(
        counter_total(
            &snapshot,
            telemetry::REQUESTS_TOTAL,
            &[("status", "ok"), ("source", "cache")]
        ),
        1
    );
    assert!(has_histogram(&snapshot, telemetry::REQUEST_DURATION_SECONDS));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
async fn token_usage_is_counted_per_direction() {
    let (snapshot, _) = record(MockProvider::new(), 1);

    assert!(
        counter_total(
            &snapshot,
            telemetry::TOKENS_TOTAL,
            &[("provider", "mock"), ("direction", "prompt")]
        ) > 0
    );
    assert!(
        counter_total(
            &snapshot,
            telemetry::TOKENS_TOTAL,
            &[("provider", "mock"), ("direction", "completion")]
        ) > 0
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
async fn retries_are_counted() {
    let mock = MockProvider::new()
        .then(MockOutcome::Timeout)
        .then(MockOutcome::backend(503, "busy"));
    let (snapshot, results) = record(mock, 1);
    assert!(results[0].is_ok());

    assert_eq!(
        counter_total(&snapshot, telemetry::RETRIES_TOTAL, &[("provider", "mock")]),
        2
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
async fn validation_failures_name_the_field() {
    let mock = MockProvider::new().then(MockOutcome::text(r#"{"confidence": 1}"#));
    let (snapshot, results) = record(mock, 1);
    assert!(results[0].is_err());

    assert_eq!(
        counter_total(
            &snapshot,
            telemetry::VALIDATION_FAILURES_TOTAL,
            &[("provider", "mock"), ("field", "ui")]
        ),
        1
    );
    assert_eq!(
        counter_total(&snapshot, telemetry::REQUESTS_TOTAL, &[("status", "error")]),
        1
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
async fn availability_probes_are_counted() {
    let (snapshot, _) = record(MockProvider::new(), 1);

    assert_eq!(
        counter_total(
            &snapshot,
            telemetry::PROBES_TOTAL,
            &[("provider", "mock"), ("status", "up")]
        ),
        1
    );
}

#[tokio::test]
async fn metrics_are_noop_without_recorder() {
    // Verify no panics when no recorder is installed.
    let pipeline = pipeline(MockProvider::new());
    pipeline
        .generate(&GenerationRequest::new("x", "y", "small"))
        .await
        .unwrap();
}
