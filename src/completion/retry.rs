use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{CompletionClient, CompletionRequest};
use crate::error::CompletionError;

/// Retry budget for transient completion faults.
///
/// `RateLimited` and `Timeout` are retried with exponential backoff until
/// `max_attempts` is spent; `Upstream` and `InvalidResponse` surface at
/// once, since the service answered and an identical request would get an
/// identical answer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryPolicy {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_base_backoff_ms")]
    pub base_backoff_ms: u64,
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_base_backoff_ms() -> u64 {
    250
}

fn default_max_backoff_ms() -> u64 {
    10_000
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_backoff_ms: default_base_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
        }
    }
}

/// Decorator adding the retry budget around any inner client.
pub struct RetryingClient<C> {
    inner: C,
    policy: RetryPolicy,
}

impl<C> RetryingClient<C> {
    pub fn new(inner: C, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }
}

// A server Retry-After hint outranks our own schedule, within the cap.
fn wait_ms_for(err: &CompletionError, delay_ms: u64, cap_ms: u64) -> u64 {
    let hinted = match err {
        CompletionError::RateLimited {
            retry_after_secs: Some(secs),
        } => delay_ms.max(secs.saturating_mul(1000)),
        _ => delay_ms,
    };
    hinted.min(cap_ms)
}

#[async_trait]
impl<C: CompletionClient> CompletionClient for RetryingClient<C> {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, CompletionError> {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut delay_ms = self.policy.base_backoff_ms.max(1);
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.inner.complete(request).await {
                Ok(text) => {
                    if attempt > 1 {
                        tracing::info!(attempt, "completion recovered after retry");
                    }
                    return Ok(text);
                }
                Err(err) if err.is_transient() && attempt < max_attempts => {
                    let wait_ms = wait_ms_for(&err, delay_ms, self.policy.max_backoff_ms);
                    tracing::warn!(
                        attempt,
                        max_attempts,
                        wait_ms,
                        error = %err,
                        "transient completion fault, backing off"
                    );
                    tokio::time::sleep(Duration::from_millis(wait_ms)).await;
                    delay_ms = (delay_ms * 2).min(self.policy.max_backoff_ms);
                }
                Err(err) => return Err(err),
            }
        }
    }
}
