//! Local Ollama daemon.
//!
//! See: <https://github.com/ollama/ollama/blob/main/docs/api.md>

use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use tracing::instrument;

use super::http;
use super::traits::{CallConfig, Provider, ProviderResponse};
use crate::Result;

/// Default daemon address.
pub const DEFAULT_BASE_URL: &str = "http://localhost:11434";

/// Model used when a request does not pin one and the catalog has none.
pub const DEFAULT_MODEL: &str = "llama3.2:3b";

/// Provider backed by a local Ollama daemon.
///
/// Calls `POST /api/generate` with streaming off and JSON output forced.
/// Availability is `GET /api/tags` answering 2xx.
#[derive(Clone)]
pub struct OllamaProvider {
    http: Client,
    base_url: String,
    model: String,
}

impl OllamaProvider {
    /// Provider talking to `base_url` (e.g. `http://localhost:11434`).
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        Ok(Self {
            http: http::client()?,
            base_url: http::base_url(base_url),
            model: DEFAULT_MODEL.to_owned(),
        })
    }

    /// Override the default model.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }
}

#[async_trait]
impl Provider for OllamaProvider {
    fn name(&self) -> &str {
        "ollama"
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    #[instrument(skip(self, prompt, config), fields(provider = "ollama"))]
    async fn call(&self, prompt: &str, model: &str, config: &CallConfig) -> Result<ProviderResponse> {
        let body = json!({
            "model": model,
            "prompt": prompt,
            "stream": false,
            "format": "json",
            "options": {
                "num_predict": config.max_tokens(),
                "num_ctx": config.max_context(),
                "temperature": config.temperature(),
            },
        });

        let value = http::send_json(
            self.http
                .post(format!("{}/api/generate", self.base_url))
                .json(&body),
        )
        .await?;

        let text = http::text_at(&value, "/response")?.to_owned();
        let usage = http::usage_at(&value, "/prompt_eval_count", "/eval_count");
        let model = value
            .get("model")
            .and_then(|m| m.as_str())
            .unwrap_or(model)
            .to_owned();

        Ok(ProviderResponse { text, usage, model })
    }

    async fn is_available(&self) -> bool {
        http::probe(self.http.get(format!("{}/api/tags", self.base_url))).await
    }
}
