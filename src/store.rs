//! Context and outcome persistence seams.
//!
//! The pipeline only ever talks to these traits. The bundled in-memory
//! store backs the CLI and the test suite; a real deployment would put
//! a database behind the same two traits.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use crate::error::StoreError;
use crate::event::{Event, SentMessage, UserContext, UserProfile};
use crate::outcome::Outcome;

/// Read side: everything the pipeline wants to know about a user.
#[async_trait]
pub trait ContextStore: Send + Sync {
    /// Unknown users are not an error. Implementations return a
    /// placeholder profile with empty history instead.
    async fn load_history(&self, user_id: &str) -> Result<UserContext, StoreError>;
}

/// Write side: the single audit record per processed event.
#[async_trait]
pub trait OutcomeStore: Send + Sync {
    async fn persist(&self, outcome: &Outcome) -> Result<(), StoreError>;
}

// ─── In-memory backend ───────────────────────────────────────────────────────

#[derive(Default)]
pub struct InMemoryStore {
    profiles: Mutex<HashMap<String, UserProfile>>,
    events: Mutex<HashMap<String, Vec<Event>>>,
    messages: Mutex<HashMap<String, Vec<SentMessage>>>,
    outcomes: Mutex<Vec<Outcome>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed_profile(&self, profile: UserProfile) {
        let mut profiles = lock(&self.profiles);
        profiles.insert(profile.user_id.clone(), profile);
    }

    pub fn seed_event(&self, event: Event) {
        let mut events = lock(&self.events);
        events.entry(event.user_id.clone()).or_default().push(event);
    }

    pub fn seed_message(&self, user_id: &str, message: SentMessage) {
        let mut messages = lock(&self.messages);
        messages.entry(user_id.to_string()).or_default().push(message);
    }

    /// Snapshot of everything persisted so far, oldest first.
    pub fn outcomes(&self) -> Vec<Outcome> {
        lock(&self.outcomes).clone()
    }
}

#[async_trait]
impl ContextStore for InMemoryStore {
    async fn load_history(&self, user_id: &str) -> Result<UserContext, StoreError> {
        let profile = lock(&self.profiles)
            .get(user_id)
            .cloned()
            .unwrap_or_else(|| UserProfile::placeholder(user_id));
        let recent_events = lock(&self.events).get(user_id).cloned().unwrap_or_default();
        let message_history = lock(&self.messages)
            .get(user_id)
            .cloned()
            .unwrap_or_default();
        Ok(UserContext {
            profile,
            recent_events,
            message_history,
        })
    }
}

#[async_trait]
impl OutcomeStore for InMemoryStore {
    async fn persist(&self, outcome: &Outcome) -> Result<(), StoreError> {
        lock(&self.outcomes).push(outcome.clone());
        Ok(())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
