//! Generation request types

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{GenError, Result};

/// Caller-supplied payload: free text or structured JSON.
///
/// Deserialises untagged, so `"some text"` becomes [`Input::Text`] and any
/// other JSON value becomes [`Input::Structured`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Input {
    Text(String),
    Structured(serde_json::Value),
}

impl Input {
    /// Whether the payload is empty once stringified.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Text(text) => text.trim().is_empty(),
            Self::Structured(serde_json::Value::Null) => true,
            Self::Structured(serde_json::Value::String(s)) => s.trim().is_empty(),
            Self::Structured(_) => false,
        }
    }
}

impl From<&str> for Input {
    fn from(text: &str) -> Self {
        Self::Text(text.to_owned())
    }
}

impl From<String> for Input {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<serde_json::Value> for Input {
    fn from(value: serde_json::Value) -> Self {
        Self::Structured(value)
    }
}

/// Logical model size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelSize {
    Small,
    Large,
}

impl ModelSize {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Small => "small",
            Self::Large => "large",
        }
    }
}

impl fmt::Display for ModelSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which model a request asks for: a logical size, or a concrete model ID.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ModelSelector {
    Logical(ModelSize),
    Concrete(String),
}

impl ModelSelector {
    /// The selector as written by the caller (`"small"`, `"gpt-4o"`, ...).
    pub fn as_str(&self) -> &str {
        match self {
            Self::Logical(size) => size.as_str(),
            Self::Concrete(id) => id,
        }
    }
}

impl From<&str> for ModelSelector {
    fn from(s: &str) -> Self {
        match s.trim() {
            "small" => Self::Logical(ModelSize::Small),
            "large" => Self::Logical(ModelSize::Large),
            other => Self::Concrete(other.to_owned()),
        }
    }
}

impl From<String> for ModelSelector {
    fn from(s: String) -> Self {
        Self::from(s.as_str())
    }
}

impl From<ModelSelector> for String {
    fn from(selector: ModelSelector) -> Self {
        selector.as_str().to_owned()
    }
}

impl FromStr for ModelSelector {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self::from(s))
    }
}

impl fmt::Display for ModelSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single generation request: `{input, intent, model}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub input: Input,
    pub intent: String,
    pub model: ModelSelector,
}

impl GenerationRequest {
    /// Create a request from any input convertible to [`Input`].
    pub fn new(
        input: impl Into<Input>,
        intent: impl Into<String>,
        model: impl Into<ModelSelector>,
    ) -> Self {
        Self {
            input: input.into(),
            intent: intent.into(),
            model: model.into(),
        }
    }

    /// Create a request from any serialisable value.
    ///
    /// Fails with [`GenError::Serialization`] if `input` cannot be
    /// represented as JSON (e.g. a map with non-string keys).
    pub fn structured<T: Serialize + ?Sized>(
        input: &T,
        intent: impl Into<String>,
        model: impl Into<ModelSelector>,
    ) -> Result<Self> {
        let value =
            serde_json::to_value(input).map_err(|e| GenError::Serialization(e.to_string()))?;
        Ok(Self::new(Input::Structured(value), intent, model))
    }

    /// Check the request invariants: non-empty input, intent and model.
    pub fn validate(&self) -> Result<()> {
        if self.input.is_empty() {
            return Err(GenError::InvalidInput("input is empty".into()));
        }
        if self.intent.trim().is_empty() {
            return Err(GenError::InvalidInput("intent is empty".into()));
        }
        if self.model.as_str().is_empty() {
            return Err(GenError::InvalidInput("model is empty".into()));
        }
        Ok(())
    }
}
