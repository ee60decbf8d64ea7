//! Boundary to the completion service. One request type, one trait, three
//! implementations: the real HTTP client, a retrying decorator, and a
//! scripted double for tests and offline runs.

mod openai;
mod retry;
mod scripted;

pub use openai::OpenAiClient;
pub use retry::{RetryPolicy, RetryingClient};
pub use scripted::ScriptedClient;

use async_trait::async_trait;
use std::sync::Arc;

pub use crate::error::CompletionError;

/// One completion call. Stages own the prompt text; the client owns the
/// wire format.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub prompt: String,
    pub system: Option<String>,
    pub model: String,
    pub temperature: f64,
    pub max_tokens: u32,
}

impl CompletionRequest {
    #[must_use]
    pub fn new(model: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            system: None,
            model: model.into(),
            temperature: 0.7,
            max_tokens: 1024,
        }
    }

    #[must_use]
    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    /// Sampling temperature, clamped to the range the service accepts.
    #[must_use]
    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature.clamp(0.0, 2.0);
        self
    }

    #[must_use]
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }
}

/// A service that answers prompts with completion text. Interpreting the
/// text is the caller's job.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, CompletionError>;
}

#[async_trait]
impl<C: CompletionClient + ?Sized> CompletionClient for Arc<C> {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, CompletionError> {
        self.as_ref().complete(request).await
    }
}
