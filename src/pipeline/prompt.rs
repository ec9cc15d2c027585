//! Prompt composition.
//!
//! The prompt is a pure function of intent and input: the same request
//! always produces the same prompt, which is what makes caching on the
//! request (rather than on the prompt) sound.

use serde_json::Value;

use crate::cache::canonical_json;
use crate::types::Input;

/// Instructions describing the output contract, prepended to every prompt.
pub const CONTRACT_INSTRUCTIONS: &str = "\
Respond with a single JSON object and nothing else. The object must have:
- \"confidence\": a number between 0 and 1
- \"ui\": an object with \"layout\" (an object) and \"components\" (an array)
Optionally include \"fallback\": an object with a string \"message\" shown \
when the UI cannot be rendered.";

/// Build the prompt sent to a provider.
pub fn compose(intent: &str, input: &Input) -> String {
    let input = match input {
        Input::Text(text) | Input::Structured(Value::String(text)) => text.trim().to_owned(),
        Input::Structured(value) => canonical_json(value),
    };
    format!(
        "{CONTRACT_INSTRUCTIONS}\n\nIntent: {}\n\nInput:\n{input}\n",
        intent.trim()
    )
}
