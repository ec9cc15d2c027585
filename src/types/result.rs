//! Generation result types

use serde::{Deserialize, Serialize};

/// Token usage statistics reported by a backend.
///
/// Informational only; nothing in the pipeline depends on it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

impl Usage {
    pub fn new(prompt_tokens: u32, completion_tokens: u32) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens.saturating_add(completion_tokens),
        }
    }
}

/// A validated generation result.
///
/// Only ever constructed after the output passed
/// [`OutputValidator`](crate::validate::OutputValidator), so it can be
/// cached and replayed as-is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationResult {
    /// The validated output payload, untouched.
    pub output: serde_json::Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
    /// Concrete model that produced the output.
    pub model: String,
    /// Provider that served the call.
    pub provider: String,
}

impl GenerationResult {
    /// The `confidence` score of the validated output.
    pub fn confidence(&self) -> Option<f64> {
        self.output.get("confidence").and_then(|c| c.as_f64())
    }

    /// The structured `ui` payload of the validated output.
    pub fn ui(&self) -> Option<&serde_json::Value> {
        self.output.get("ui")
    }
}
