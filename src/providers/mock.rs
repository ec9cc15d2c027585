//! Deterministic in-process provider.
//!
//! Always available unless told otherwise, never touches the network and
//! answers every call with the same contract-valid document. Tests script
//! failures by queueing [`MockOutcome`]s, consumed one per call before the
//! default response applies again.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use super::traits::{CallConfig, Provider, ProviderResponse};
use crate::types::Usage;
use crate::{GenError, Result};

pub const DEFAULT_MODEL: &str = "mock-small";

/// Response served when no outcome is queued.
pub const DEFAULT_RESPONSE: &str =
    r#"{"confidence":1.0,"ui":{"layout":{"type":"stack"},"components":[]}}"#;

/// What a single mock call does.
#[derive(Debug, Clone, PartialEq)]
pub enum MockOutcome {
    /// Return this text as the raw output.
    Text(String),
    /// Fail with [`GenError::Backend`].
    Backend { status: Option<u16>, message: String },
    /// Fail with [`GenError::Timeout`] right away.
    Timeout,
    /// Fail with [`GenError::ResponseShape`].
    ResponseShape(String),
    /// Sleep this long, then return the default response. Lets a real
    /// deadline fire.
    Stall(Duration),
}

impl MockOutcome {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }

    pub fn backend(status: u16, message: impl Into<String>) -> Self {
        Self::Backend {
            status: Some(status),
            message: message.into(),
        }
    }
}

/// Scriptable provider for tests and last-resort fallback.
pub struct MockProvider {
    name: String,
    model: String,
    response: String,
    script: Mutex<VecDeque<MockOutcome>>,
    calls: AtomicU32,
    available: AtomicBool,
}

impl Default for MockProvider {
    fn default() -> Self {
        Self {
            name: "mock".to_owned(),
            model: DEFAULT_MODEL.to_owned(),
            response: DEFAULT_RESPONSE.to_owned(),
            script: Mutex::new(VecDeque::new()),
            calls: AtomicU32::new(0),
            available: AtomicBool::new(true),
        }
    }
}

impl MockProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Report a different provider name.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Replace the default response.
    pub fn with_response(mut self, text: impl Into<String>) -> Self {
        self.response = text.into();
        self
    }

    /// Queue an outcome for the next unscripted call.
    pub fn then(self, outcome: MockOutcome) -> Self {
        self.push(outcome);
        self
    }

    /// Queue an outcome on a shared provider.
    pub fn push(&self, outcome: MockOutcome) {
        match self.script.lock() {
            Ok(mut script) => script.push_back(outcome),
            Err(poisoned) => poisoned.into_inner().push_back(outcome),
        }
    }

    /// Toggle what `is_available` reports.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Number of `call` invocations so far.
    pub fn call_count(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    fn next_outcome(&self) -> Option<MockOutcome> {
        match self.script.lock() {
            Ok(mut script) => script.pop_front(),
            Err(poisoned) => poisoned.into_inner().pop_front(),
        }
    }

    fn respond(&self, text: String, model: &str, prompt: &str) -> ProviderResponse {
        let prompt_tokens = u32::try_from(prompt.split_whitespace().count()).unwrap_or(u32::MAX);
        let completion_tokens = u32::try_from(text.split_whitespace().count()).unwrap_or(u32::MAX);
        ProviderResponse {
            text,
            usage: Some(Usage::new(prompt_tokens, completion_tokens)),
            model: model.to_owned(),
        }
    }
}

#[async_trait]
impl Provider for MockProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    async fn call(&self, prompt: &str, model: &str, _config: &CallConfig) -> Result<ProviderResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.next_outcome() {
            None => Ok(self.respond(self.response.clone(), model, prompt)),
            Some(MockOutcome::Text(text)) => Ok(self.respond(text, model, prompt)),
            Some(MockOutcome::Backend { status, message }) => {
                Err(GenError::Backend { status, message })
            }
            Some(MockOutcome::Timeout) => Err(GenError::Timeout(Duration::ZERO)),
            Some(MockOutcome::ResponseShape(message)) => Err(GenError::ResponseShape(message)),
            Some(MockOutcome::Stall(duration)) => {
                tokio::time::sleep(duration).await;
                Ok(self.respond(self.response.clone(), model, prompt))
            }
        }
    }

    async fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }
}
