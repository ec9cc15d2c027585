//! Shared HTTP plumbing for the network-backed providers.

use reqwest::{Client, RequestBuilder};
use serde_json::Value;

use crate::error::truncate;
use crate::types::Usage;
use crate::{GenError, Result};

/// Upper bound on the backend error body carried in [`GenError::Backend`].
const ERROR_BODY_LIMIT: usize = 500;

/// Build the client used by a provider.
///
/// No client-level timeout: deadlines are applied per call by the
/// orchestrator and per probe by the registry.
pub(crate) fn client() -> Result<Client> {
    Client::builder()
        .build()
        .map_err(|e| GenError::Configuration(format!("failed to build HTTP client: {e}")))
}

/// Send `request` and parse the body as JSON.
///
/// Non-2xx statuses become [`GenError::Backend`] with a truncated body;
/// transport failures become [`GenError::Backend`] without a status; a
/// body that is not JSON becomes [`GenError::ResponseShape`].
pub(crate) async fn send_json(request: RequestBuilder) -> Result<Value> {
    let response = request.send().await.map_err(|e| GenError::Backend {
        status: e.status().map(|s| s.as_u16()),
        message: e.to_string(),
    })?;

    let status = response.status();
    let body = response.text().await.map_err(|e| GenError::Backend {
        status: Some(status.as_u16()),
        message: format!("failed to read body: {e}"),
    })?;

    if !status.is_success() {
        return Err(GenError::Backend {
            status: Some(status.as_u16()),
            message: truncate(&body, ERROR_BODY_LIMIT),
        });
    }

    serde_json::from_str(&body).map_err(|e| {
        GenError::ResponseShape(format!(
            "body is not JSON ({e}): {}",
            truncate(&body, ERROR_BODY_LIMIT)
        ))
    })
}

/// `true` when `request` completes with a 2xx status.
pub(crate) async fn probe(request: RequestBuilder) -> bool {
    match request.send().await {
        Ok(response) => response.status().is_success(),
        Err(_) => false,
    }
}

/// Read a string at a JSON pointer, or fail with a shape error naming it.
pub(crate) fn text_at<'a>(value: &'a Value, pointer: &str) -> Result<&'a str> {
    value
        .pointer(pointer)
        .and_then(Value::as_str)
        .ok_or_else(|| GenError::ResponseShape(format!("missing text at `{pointer}`")))
}

/// Read a token count at a JSON pointer; absent or non-numeric reads as `None`.
pub(crate) fn count_at(value: &Value, pointer: &str) -> Option<u32> {
    value
        .pointer(pointer)
        .and_then(Value::as_u64)
        .map(|n| u32::try_from(n).unwrap_or(u32::MAX))
}

/// Token usage from two counters. `None` only when both are absent.
pub(crate) fn usage_at(value: &Value, prompt: &str, completion: &str) -> Option<Usage> {
    match (count_at(value, prompt), count_at(value, completion)) {
        (None, None) => None,
        (p, c) => Some(Usage::new(p.unwrap_or(0), c.unwrap_or(0))),
    }
}

/// Strip trailing slashes so paths can be appended with `format!`.
pub(crate) fn base_url(url: impl Into<String>) -> String {
    let mut url = url.into();
    while url.ends_with('/') {
        url.pop();
    }
    url
}
