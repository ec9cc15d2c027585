//! Output contract validation.
//!
//! [`OutputValidator`] proves the *shape* of a provider's output and
//! nothing else. It never coerces (`"0.8"` is not a number), never fills
//! in defaults and never judges plausibility (a confidence of `7.5` passes).
//!
//! The contract, checked in this order, stopping at the first failure:
//!
//! 1. the output is a JSON object;
//! 2. `confidence` is present and a number, `ui` is present and an object;
//! 3. `ui.layout` is an object and `ui.components` is an array;
//! 4. if `fallback` is present, it is an object with a string `message`.
//!
//! Every failure is a distinct [`ValidationError`] naming the offending
//! field, so callers can branch on which clause broke.

use serde_json::{Map, Value};

use crate::error::truncate;

/// Default maximum length of the offending-text preview in errors.
pub const DEFAULT_PREVIEW_LIMIT: usize = 120;

/// A broken clause of the output contract.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("output is not valid JSON ({reason}): {preview}")]
    InvalidFormat { preview: String, reason: String },

    #[error("output must be a JSON object, found {found}")]
    NotAnObject { found: &'static str },

    #[error("missing required field `{field}`")]
    MissingField { field: &'static str },

    #[error("field `{field}` must be {expected}, found {found}")]
    WrongType {
        field: &'static str,
        expected: &'static str,
        found: &'static str,
    },
}

impl ValidationError {
    /// The contract field this error is about, if any.
    pub fn field(&self) -> Option<&'static str> {
        match self {
            Self::MissingField { field } | Self::WrongType { field, .. } => Some(*field),
            Self::InvalidFormat { .. } | Self::NotAnObject { .. } => None,
        }
    }
}

/// Raw provider output: text to be parsed, or an already-parsed value.
#[derive(Debug, Clone, PartialEq)]
pub enum RawOutput {
    Text(String),
    Json(Value),
}

impl From<String> for RawOutput {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<&str> for RawOutput {
    fn from(text: &str) -> Self {
        Self::Text(text.to_owned())
    }
}

impl From<Value> for RawOutput {
    fn from(value: Value) -> Self {
        Self::Json(value)
    }
}

/// Output that satisfied the contract. Holds the parsed value untouched.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedOutput {
    value: Value,
}

impl ValidatedOutput {
    pub fn confidence(&self) -> f64 {
        self.value["confidence"].as_f64().unwrap_or_default()
    }

    pub fn ui(&self) -> &Value {
        &self.value["ui"]
    }

    pub fn fallback_message(&self) -> Option<&str> {
        self.value.get("fallback")?.get("message")?.as_str()
    }

    pub fn as_value(&self) -> &Value {
        &self.value
    }

    pub fn into_value(self) -> Value {
        self.value
    }
}

/// Strict, non-repairing output validator.
#[derive(Debug, Clone)]
pub struct OutputValidator {
    preview_limit: usize,
}

impl Default for OutputValidator {
    fn default() -> Self {
        Self {
            preview_limit: DEFAULT_PREVIEW_LIMIT,
        }
    }
}

impl OutputValidator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cap the preview of unparseable text carried by
    /// [`ValidationError::InvalidFormat`].
    pub fn preview_limit(mut self, chars: usize) -> Self {
        self.preview_limit = chars;
        self
    }

    /// Parse (at most once) and check `raw` against the contract.
    pub fn validate(
        &self,
        raw: impl Into<RawOutput>,
    ) -> std::result::Result<ValidatedOutput, ValidationError> {
        let value = match raw.into() {
            RawOutput::Json(value) => value,
            RawOutput::Text(text) => {
                serde_json::from_str(&text).map_err(|e| ValidationError::InvalidFormat {
                    preview: truncate(&text, self.preview_limit),
                    reason: e.to_string(),
                })?
            }
        };

        let root = value.as_object().ok_or(ValidationError::NotAnObject {
            found: kind(&value),
        })?;

        require(root, "confidence", "confidence", Expect::Number)?;
        let ui = require_object(root, "ui", "ui")?;
        require(ui, "layout", "ui.layout", Expect::Object)?;
        require(ui, "components", "ui.components", Expect::Array)?;

        if root.contains_key("fallback") {
            let fallback = require_object(root, "fallback", "fallback")?;
            require(fallback, "message", "fallback.message", Expect::String)?;
        }

        Ok(ValidatedOutput { value })
    }
}

#[derive(Clone, Copy)]
enum Expect {
    Number,
    String,
    Object,
    Array,
}

impl Expect {
    fn matches(self, value: &Value) -> bool {
        match self {
            Self::Number => value.is_number(),
            Self::String => value.is_string(),
            Self::Object => value.is_object(),
            Self::Array => value.is_array(),
        }
    }

    fn describe(self) -> &'static str {
        match self {
            Self::Number => "a number",
            Self::String => "a string",
            Self::Object => "an object",
            Self::Array => "an array",
        }
    }
}

fn require<'a>(
    object: &'a Map<String, Value>,
    key: &str,
    field: &'static str,
    expect: Expect,
) -> std::result::Result<&'a Value, ValidationError> {
    let value = object
        .get(key)
        .ok_or(ValidationError::MissingField { field })?;
    if !expect.matches(value) {
        return Err(ValidationError::WrongType {
            field,
            expected: expect.describe(),
            found: kind(value),
        });
    }
    Ok(value)
}

fn require_object<'a>(
    object: &'a Map<String, Value>,
    key: &str,
    field: &'static str,
) -> std::result::Result<&'a Map<String, Value>, ValidationError> {
    match object.get(key) {
        Some(Value::Object(map)) => Ok(map),
        Some(other) => Err(ValidationError::WrongType {
            field,
            expected: Expect::Object.describe(),
            found: kind(other),
        }),
        None => Err(ValidationError::MissingField { field }),
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
