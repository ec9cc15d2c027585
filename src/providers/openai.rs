//! OpenAI-compatible chat completions API.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use tracing::instrument;

use super::http;
use super::traits::{CallConfig, Provider, ProviderResponse};
use crate::Result;

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com";
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// Provider backed by `POST /v1/chat/completions`.
///
/// Works against any server speaking the same wire format; point
/// [`with_base_url`](Self::with_base_url) at it. Availability requires a
/// non-empty key and `GET /v1/models` answering 2xx.
#[derive(Clone)]
pub struct OpenAiProvider {
    http: Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl OpenAiProvider {
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
}

#[async_trait]
impl Provider for OpenAiProvider {
    fn name(&self) -> &str {
        "openai"
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    #[instrument(skip(self, prompt, config), fields(provider = "openai"))]
    async fn call(&self, prompt: &str, model: &str, config: &CallConfig) -> Result<ProviderResponse> {
        let body = json!({
            "model": model,
            "messages": [{ "role": "user", "content": prompt }],
            "max_tokens": config.max_tokens(),
            "temperature": config.temperature(),
            "response_format": { "type": "json_object" },
            "stream": false,
        });

        let value = http::send_json(
            self.http
                .post(format!("{}/v1/chat/completions", self.base_url))
                .bearer_auth(&self.api_key)
                .json(&body),
        )
        .await?;

        let text = http::text_at(&value, "/choices/0/message/content")?.to_owned();
        let usage = http::usage_at(&value, "/usage/prompt_tokens", "/usage/completion_tokens");
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
        http::probe(
            self.http
                .get(format!("{}/v1/models", self.base_url))
                .bearer_auth(&self.api_key),
        )
        .await
    }
}
