//! Deterministic cache key derivation.
//!
//! A key is the hex SHA-256 digest of four length-prefixed components:
//! the canonical input, the trimmed intent, the model and the pipeline
//! tag. Length prefixes keep `("ab", "c")` and `("a", "bc")` apart.
//!
//! The pipeline keys on the concrete model it dispatches to
//! ([`KeyDeriver::derive_for_model`]), so a logical alias such as
//! `"small"` served by two different backends yields two entries.
//!
//! Structured inputs are serialised canonically (object keys sorted at
//! every depth, no insignificant whitespace) before hashing. Without this,
//! two logically identical requests could hash differently and silently
//! fragment the cache.

use std::fmt;

use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::types::{GenerationRequest, Input};
use crate::{GenError, Result};

/// Opaque fixed-length cache key (64 lowercase hex characters).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    /// Wrap an existing key string.
    ///
    /// Rejects the empty string, which no derivation can produce.
    pub fn new(key: impl Into<String>) -> Result<Self> {
        let key = key.into();
        if key.is_empty() {
            return Err(GenError::InvalidInput("cache key is empty".into()));
        }
        Ok(Self(key))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Derives [`CacheKey`]s for generation requests under one pipeline tag.
#[derive(Debug, Clone)]
pub struct KeyDeriver {
    version: String,
}

impl KeyDeriver {
    pub fn new(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
        }
    }

    /// The pipeline tag mixed into every key.
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Derive the key for a request, using its model selector as written.
    pub fn derive(&self, request: &GenerationRequest) -> CacheKey {
        self.derive_for_model(request, request.model.as_str())
    }

    /// Derive the key for a request that resolved to `model`.
    pub fn derive_for_model(&self, request: &GenerationRequest, model: &str) -> CacheKey {
        let input = canonical_input(&request.input);
        self.digest(&input, &request.intent, model)
    }

    /// Derive a key from an arbitrary serialisable input.
    ///
    /// Fails with [`GenError::Serialization`] when `input` has no JSON
    /// representation; never falls back to a placeholder key.
    pub fn derive_parts<T: Serialize + ?Sized>(
        &self,
        input: &T,
        intent: &str,
        model: &str,
    ) -> Result<CacheKey> {
        let value =
            serde_json::to_value(input).map_err(|e| GenError::Serialization(e.to_string()))?;
        let input = canonical_input(&Input::Structured(value));
        Ok(self.digest(&input, intent, model))
    }

    fn digest(&self, input: &str, intent: &str, model: &str) -> CacheKey {
        let mut hasher = Sha256::new();
        for part in [input, intent.trim(), model, self.version.as_str()] {
            hasher.update((part.len() as u64).to_le_bytes());
            hasher.update(part.as_bytes());
        }
        CacheKey(format!("{:x}", hasher.finalize()))
    }
}

/// Text inputs (bare or wrapped in JSON) are trimmed; everything else is
/// serialised canonically.
fn canonical_input(input: &Input) -> String {
    match input {
        Input::Text(text) | Input::Structured(Value::String(text)) => {
            canonical_json(&Value::String(text.trim().to_owned()))
        }
        Input::Structured(value) => canonical_json(value),
    }
}

/// Serialise `value` with object keys sorted at every depth.
pub fn canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<_> = map.iter().collect();
            entries.sort_by(|(a, _), (b, _)| a.cmp(b));
            out.push('{');
            for (i, (key, val)) in entries.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                // Serialising a plain string cannot fail.
                out.push_str(&Value::String(key.clone()).to_string());
                out.push(':');
                write_canonical(val, out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn canonical_json_sorts_nested_keys() {
        let value = json!({"b": 1, "a": {"d": [ {"z": 1, "y": 2} ], "c": null}});
        assert_eq!(
            canonical_json(&value),
            r#"{"a":{"c":null,"d":[{"y":2,"z":1}]},"b":1}"#
        );
    }

    #[test]
    fn canonical_json_escapes_keys() {
        let value = json!({"q\"uote": "v"});
        assert_eq!(canonical_json(&value), r#"{"q\"uote":"v"}"#);
    }

    #[test]
    fn key_is_64_hex_chars() {
        let key = KeyDeriver::new("v1").derive(&GenerationRequest::new("x", "y", "small"));
        assert_eq!(key.as_str().len(), 64);
        assert!(key.as_str().chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn length_prefix_separates_components() {
        let deriver = KeyDeriver::new("v1");
        let a = deriver.derive(&GenerationRequest::new("ab", "c", "small"));
        let b = deriver.derive(&GenerationRequest::new("a", "bc", "small"));
        assert_ne!(a, b);
    }

    #[test]
    fn resolved_model_replaces_the_selector() {
        let deriver = KeyDeriver::new("v1");
        let req = GenerationRequest::new("x", "y", "small");
        assert_eq!(deriver.derive(&req), deriver.derive_for_model(&req, "small"));
        assert_ne!(
            deriver.derive_for_model(&req, "mock/mock-small"),
            deriver.derive_for_model(&req, "ollama/llama3.2:3b")
        );
    }

    #[test]
    fn empty_key_rejected() {
        assert!(CacheKey::new("").is_err());
        assert!(CacheKey::new("abc").is_ok());
    }
}
