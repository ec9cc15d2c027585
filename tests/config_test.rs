//! Tests for configuration loading, overrides and sanitising.

use std::collections::HashMap;
use std::time::Duration;

use genpipe::config::{
    CACHE_MAX_SIZE_CEILING, MAX_TOKENS_CEILING, OllamaConfig, ProviderSelection, RETRY_ATTEMPTS_CEILING,
    TIMEOUT_CEILING_MS,
};
use genpipe::pipeline::OrchestratorBuilder;
use genpipe::{ConfigSource, GenError, ModelSelector, ModelSize, RuntimeConfig, SharedConfig};

fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    move |key| map.get(key).cloned()
}

// ============================================================================
// Files
// ============================================================================

#[test]
fn full_file_round_trips() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(
        &path,
        r#"
active_model = "large"
provider = "auto"
max_tokens = 2048
timeout_ms = 10000
memory_budget_mb = 16384
pipeline_version = "2025-01"

[cache]
ttl_secs = 600
max_size = 50

[retry]
attempts = 4
base_delay_ms = 100

[providers]
cloud_preference = ["anthropic", "openai"]

[providers.ollama]
base_url = "http://gpu-box:11434"
default_model = "qwen2.5:14b"

[providers.anthropic]
api_key_env = "MY_CLAUDE_KEY"

[providers.mock]
enabled = false
"#,
    )
    .unwrap();

    let config = RuntimeConfig::from_file(&path).unwrap();

    assert_eq!(config.active_selector(), ModelSelector::Logical(ModelSize::Large));
    assert_eq!(config.provider_selection(), ProviderSelection::BestAvailable);
    assert_eq!(config.max_tokens, 2048);
    assert_eq!(config.max_context, 4096, "unset fields keep defaults");
    assert_eq!(config.pipeline_tag(), "2025-01");
    assert_eq!(config.cache.max_size, 50);
    assert_eq!(config.retry.attempts, 4);
    assert_eq!(config.retry.max_delay_ms, 5_000);
    assert_eq!(
        config.providers.ollama,
        Some(OllamaConfig {
            base_url: "http://gpu-box:11434".into(),
            default_model: Some("qwen2.5:14b".into()),
        })
    );
    assert!(config.providers.openai.is_none());
    assert!(!config.providers.mock.enabled);
    assert_eq!(config.providers.cloud_preference, vec!["anthropic", "openai"]);

    let cache = config.cache_config();
    assert_eq!(cache.max_size, 50);
    assert_eq!(cache.ttl, Duration::from_secs(600));
}

#[test]
fn empty_file_is_all_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "").unwrap();

    assert_eq!(RuntimeConfig::from_file(&path).unwrap(), RuntimeConfig::default());
}

#[test]
fn malformed_file_is_a_configuration_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "max_tokens = \"lots\"").unwrap();

    assert!(matches!(
        RuntimeConfig::from_file(&path),
        Err(GenError::Configuration(_))
    ));
}

#[test]
fn explicit_missing_path_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = RuntimeConfig::load(Some(&dir.path().join("absent.toml"))).unwrap_err();
    assert!(matches!(err, GenError::Configuration(msg) if msg.contains("not found")));
}

// ============================================================================
// Environment overrides
// ============================================================================

#[test]
fn env_overrides_apply() {
    let mut config = RuntimeConfig::default();
    config.apply_env(env(&[
        ("GENPIPE_MODEL", "gpt-4o"),
        ("GENPIPE_PROVIDER", "openai"),
        ("GENPIPE_MAX_TOKENS", "512"),
        ("GENPIPE_CACHE_TTL_SECS", " 30 "),
        ("GENPIPE_CACHE_MAX_SIZE", "7"),
    ]));

    assert_eq!(config.active_selector(), ModelSelector::Concrete("gpt-4o".into()));
    assert_eq!(
        config.provider_selection(),
        ProviderSelection::Named("openai".into())
    );
    assert_eq!(config.max_tokens, 512);
    assert_eq!(config.cache.ttl_secs, 30);
    assert_eq!(config.cache.max_size, 7);
}

#[test]
fn unparseable_env_numbers_are_ignored() {
    let mut config = RuntimeConfig::default();
    config.apply_env(env(&[("GENPIPE_MAX_TOKENS", "many"), ("GENPIPE_CACHE_MAX_SIZE", "-1")]));

    assert_eq!(config.max_tokens, RuntimeConfig::default().max_tokens);
    assert_eq!(config.cache.max_size, RuntimeConfig::default().cache.max_size);
}

#[test]
fn api_keys_come_from_the_environment() {
    let mut config = RuntimeConfig::default();
    let lookup = env(&[
        ("OPENAI_API_KEY", "sk-test"),
        ("ANTHROPIC_API_KEY", ""),
        ("MY_CLAUDE_KEY", "sk-ant"),
    ]);

    assert_eq!(config.api_key("openai", &lookup).as_deref(), Some("sk-test"));
    assert_eq!(config.api_key("anthropic", &lookup), None, "empty reads as absent");
    assert_eq!(config.api_key("ollama", &lookup), None);

    config.providers.anthropic = Some(genpipe::config::CloudConfig {
        api_key_env: Some("MY_CLAUDE_KEY".into()),
        ..Default::default()
    });
    assert_eq!(config.api_key("anthropic", &lookup).as_deref(), Some("sk-ant"));
}

// ============================================================================
// Sanitising
// ============================================================================

#[test]
fn limits_are_clamped_to_ceilings() {
    let config = RuntimeConfig {
        max_tokens: 1_000_000,
        timeout_ms: u64::MAX,
        temperature: 9.0,
        ..RuntimeConfig::default()
    };
    let mut config = config;
    config.cache.max_size = usize::MAX;
    config.retry.attempts = 100;

    let clean = config.sanitized();
    assert_eq!(clean.max_tokens, MAX_TOKENS_CEILING);
    assert_eq!(clean.timeout_ms, TIMEOUT_CEILING_MS);
    assert_eq!(clean.temperature, 2.0);
    assert_eq!(clean.cache.max_size, CACHE_MAX_SIZE_CEILING);
    assert_eq!(clean.retry.attempts, RETRY_ATTEMPTS_CEILING);
    assert_eq!(clean.retry_config().total_attempts(), RETRY_ATTEMPTS_CEILING + 1);
}

#[test]
fn zero_deadlines_fall_back_to_defaults() {
    let config = RuntimeConfig {
        timeout_ms: 0,
        probe_timeout_ms: 0,
        max_tokens: 0,
        ..RuntimeConfig::default()
    };
    let clean = config.sanitized();
    let defaults = RuntimeConfig::default();

    assert_eq!(clean.timeout_ms, defaults.timeout_ms);
    assert_eq!(clean.probe_timeout_ms, defaults.probe_timeout_ms);
    assert_eq!(clean.max_tokens, defaults.max_tokens);
    assert_eq!(
        clean.call_config().unwrap().timeout(),
        Duration::from_millis(defaults.timeout_ms)
    );
}

#[test]
fn unsanitised_zero_timeout_is_rejected_by_call_config() {
    let config = RuntimeConfig {
        timeout_ms: 0,
        ..RuntimeConfig::default()
    };
    assert!(matches!(config.call_config(), Err(GenError::Configuration(_))));
}

#[test]
fn pipeline_tag_defaults_to_crate_version() {
    let tag = RuntimeConfig::default().pipeline_tag();
    assert!(tag.contains(genpipe::version::PKG_VERSION), "{tag}");
}

// ============================================================================
// Live configuration
// ============================================================================

#[test]
fn shared_config_updates_are_visible() {
    let shared = SharedConfig::new(RuntimeConfig::default());
    let reader = shared.clone();

    shared.modify(|c| c.max_tokens = 99);
    assert_eq!(reader.current().max_tokens, 99);

    shared.update(RuntimeConfig::default());
    assert_eq!(reader.current(), RuntimeConfig::default());
}

#[test]
fn shared_config_clamps_when_stored() {
    let shared = SharedConfig::new(RuntimeConfig {
        timeout_ms: 0,
        ..RuntimeConfig::default()
    });
    assert_eq!(shared.current().timeout_ms, RuntimeConfig::default().timeout_ms);

    shared.modify(|c| c.max_tokens = 1_000_000);
    assert_eq!(shared.current().max_tokens, MAX_TOKENS_CEILING);

    shared.update(RuntimeConfig {
        retry: genpipe::config::RetrySection {
            attempts: 100,
            ..Default::default()
        },
        ..RuntimeConfig::default()
    });
    let stored = shared.current();
    assert_eq!(stored.retry.attempts, RETRY_ATTEMPTS_CEILING);
    assert_eq!(stored, stored.sanitized_quietly(), "already clean, nothing to re-report");
}

// ============================================================================
// Builder from configuration
// ============================================================================

#[test]
fn providers_register_in_priority_order() {
    let mut config = RuntimeConfig::default();
    config.providers.ollama = Some(OllamaConfig::default());
    config.providers.openai = Some(Default::default());
    config.providers.anthropic = Some(Default::default());
    config.providers.cloud_preference = vec!["anthropic".into()];

    let pipeline = OrchestratorBuilder::from_config_with_env(
        config,
        env(&[("OPENAI_API_KEY", "sk-1"), ("ANTHROPIC_API_KEY", "sk-2")]),
    )
    .build()
    .unwrap();

    assert_eq!(
        pipeline.registry().names(),
        vec!["ollama", "anthropic", "openai", "mock"]
    );
}

#[test]
fn cloud_sections_without_keys_are_skipped() {
    let mut config = RuntimeConfig::default();
    config.providers.openai = Some(Default::default());

    let pipeline = OrchestratorBuilder::from_config_with_env(config, env(&[]))
        .build()
        .unwrap();
    assert_eq!(pipeline.registry().names(), vec!["mock"]);
}

#[test]
fn disabled_mock_and_nothing_else_is_no_provider() {
    let mut config = RuntimeConfig::default();
    config.providers.mock.enabled = false;

    let err = OrchestratorBuilder::from_config_with_env(config, env(&[]))
        .build()
        .err()
        .unwrap();
    assert!(matches!(err, GenError::NoProvider));
}

#[test]
fn naming_an_unregistered_provider_fails_the_build() {
    let mut config = RuntimeConfig::default();
    config.provider = Some("openai".into());
    config.providers.openai = Some(Default::default());

    // Section present but no key, so openai is never registered.
    let err = OrchestratorBuilder::from_config_with_env(config, env(&[]))
        .build()
        .err()
        .unwrap();
    assert!(matches!(err, GenError::UnknownProvider(name) if name == "openai"));
}
