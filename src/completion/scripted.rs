use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use super::{CompletionClient, CompletionRequest};
use crate::error::CompletionError;

/// Deterministic stand-in for the completion service. Pops scripted replies
/// in order and records every request it saw. Tests drive it directly; the
/// demo binary uses it when no API key is configured.
#[derive(Default)]
pub struct ScriptedClient {
    script: Mutex<VecDeque<Result<String, CompletionError>>>,
    seen: Mutex<Vec<CompletionRequest>>,
    calls: AtomicUsize,
}

impl ScriptedClient {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_replies<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let client = Self::new();
        for reply in replies {
            client.push(reply);
        }
        client
    }

    /// Canned exchange for offline runs: the decision engages, the draft is
    /// an abandoned-cart email, review approves it first pass.
    #[must_use]
    pub fn offline_demo() -> Self {
        Self::with_replies([
            r#"{"act": true, "intent": "retention", "rationale": "Items are sitting in the cart and the user has gone quiet.", "confidence": 0.84}"#,
            r#"{"channel": "email", "subject": "Your cart is holding your picks", "body": "Hi! The items you picked out are still waiting in your cart. Checkout takes one tap, and we will keep them reserved for a little while longer."}"#,
            r#"{"approved": true, "overall_score": 0.91, "criteria_scores": {"grammar": 0.95, "tone": 0.9, "personalization": 0.82, "relevance": 0.95, "spam_risk": 0.1, "ethics": 1.0}, "comments": "Clear, light touch, one call to action."}"#,
        ])
    }

    pub fn push(&self, reply: impl Into<String>) {
        self.lock_script().push_back(Ok(reply.into()));
    }

    pub fn push_error(&self, error: CompletionError) {
        self.lock_script().push_back(Err(error));
    }

    /// Completions served so far, successes and failures both.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Requests seen so far, in arrival order.
    #[must_use]
    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.lock_seen().clone()
    }

    fn lock_script(&self) -> MutexGuard<'_, VecDeque<Result<String, CompletionError>>> {
        self.script.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_seen(&self) -> MutexGuard<'_, Vec<CompletionRequest>> {
        self.seen.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl CompletionClient for ScriptedClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, CompletionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.lock_seen().push(request.clone());
        self.lock_script().pop_front().unwrap_or_else(|| {
            Err(CompletionError::InvalidResponse(
                "scripted replies exhausted".into(),
            ))
        })
    }
}
