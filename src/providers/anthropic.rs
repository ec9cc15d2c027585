//! Anthropic Messages API.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde_json::{Value, json};
use tracing::instrument;

use super::http;
use super::traits::{CallConfig, Provider, ProviderResponse};
use crate::{GenError, Result};

pub const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
pub const DEFAULT_MODEL: &str = "claude-3-5-haiku-latest";
const API_VERSION: &str = "2023-06-01";

/// Provider backed by `POST /v1/messages`.
///
/// The reply text is the concatenation of every `text` content block.
/// Availability requires a non-empty key and `GET /v1/models` answering 2xx.
#[derive(Clone)]
pub struct AnthropicProvider {
    http: Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl AnthropicProvider {
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        Self::with_base_url(api_key, DEFAULT_BASE_URL)
    }

    /// Create a provider with a custom base URL (for testing with wiremock).
    pub fn with_base_url(api_key: impl Into<String>, base_url: impl Into<String>) -> Result<Self> {
        Ok(Self {
            http: http::client()?,
            api_key: api_key.into(),
            base_url: http::base_url(base_url),
            model: DEFAULT_MODEL.to_owned(),
        })
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    fn authed(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
    }
}

#[async_trait]
impl Provider for AnthropicProvider {
    fn name(&self) -> &str {
        "anthropic"
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    #[instrument(skip(self, prompt, config), fields(provider = "anthropic"))]
    async fn call(&self, prompt: &str, model: &str, config: &CallConfig) -> Result<ProviderResponse> {
        let body = json!({
            "model": model,
            "max_tokens": config.max_tokens(),
            "temperature": config.temperature(),
            "messages": [{ "role": "user", "content": prompt }],
            "stream": false,
        });

        let value = http::send_json(
            self.authed(self.http.post(format!("{}/v1/messages", self.base_url)))
                .json(&body),
        )
        .await?;

        let text = content_text(&value)?;
        let usage = http::usage_at(&value, "/usage/input_tokens", "/usage/output_tokens");
        let model = value
            .get("model")
            .and_then(|m| m.as_str())
            .unwrap_or(model)
            .to_owned();

        Ok(ProviderResponse { text, usage, model })
    }

    async fn is_available(&self) -> bool {
        if self.api_key.trim().is_empty() {
            return false;
        }
        http::probe(self.authed(self.http.get(format!("{}/v1/models", self.base_url)))).await
    }
}

fn content_text(value: &Value) -> Result<String> {
    let blocks = value
        .get("content")
        .and_then(Value::as_array)
        .ok_or_else(|| GenError::ResponseShape("missing `content` array".into()))?;

    let mut texts = blocks
        .iter()
        .filter(|b| b.get("type").and_then(Value::as_str) == Some("text"))
        .filter_map(|b| b.get("text").and_then(Value::as_str))
        .peekable();

    if texts.peek().is_none() {
        return Err(GenError::ResponseShape("no text block in `content`".into()));
    }
    Ok(texts.collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn joins_text_blocks_and_skips_others() {
        let value = json!({"content": [
            {"type": "text", "text": "{\"a\":"},
            {"type": "tool_use", "id": "x"},
            {"type": "text", "text": "1}"}
        ]});
        assert_eq!(content_text(&value).unwrap(), "{\"a\":1}");
    }

    #[test]
    fn no_text_block_is_shape_error() {
        let value = json!({"content": []});
        assert!(matches!(
            content_text(&value),
            Err(GenError::ResponseShape(_))
        ));
    }
}
