//! Drives one behavioral event through decide, draft and check, and
//! persists exactly one [`Outcome`] whatever happened along the way.

use chrono::Utc;
use std::sync::Arc;

use super::decision::DecisionStage;
use super::generation::GenerationStage;
use super::quality::QualityStage;
use super::throttle::EngagementThrottle;
use crate::completion::CompletionClient;
use crate::config::Config;
use crate::error::{PipelineError, StoreError};
use crate::event::Event;
use crate::outcome::{Decision, Outcome, VerdictFeedback};
use crate::prompt::PromptRegistry;
use crate::store::{ContextStore, OutcomeStore};

pub struct Pipeline {
    decision: DecisionStage,
    generation: GenerationStage,
    quality: QualityStage,
    throttle: EngagementThrottle,
    context_store: Arc<dyn ContextStore>,
    outcome_store: Arc<dyn OutcomeStore>,
    max_revisions: u32,
}

impl Pipeline {
    #[must_use]
    pub fn new(
        client: Arc<dyn CompletionClient>,
        registry: PromptRegistry,
        context_store: Arc<dyn ContextStore>,
        outcome_store: Arc<dyn OutcomeStore>,
        config: &Config,
    ) -> Self {
        Self {
            decision: DecisionStage::new(Arc::clone(&client), registry.clone(), &config.llm),
            generation: GenerationStage::new(Arc::clone(&client), registry.clone(), &config.llm),
            quality: QualityStage::new(client, registry, &config.llm),
            throttle: EngagementThrottle::new(&config.throttle),
            context_store,
            outcome_store,
            max_revisions: config.pipeline.max_revisions,
        }
    }

    /// Process one event end to end.
    ///
    /// Stage faults never escape: they are folded into the persisted
    /// [`Outcome`]. The only error a caller sees is a failure to persist
    /// that outcome.
    pub async fn process(&self, event: &Event) -> Result<Outcome, StoreError> {
        let outcome = self.run(event).await;
        self.outcome_store.persist(&outcome).await?;
        tracing::info!(
            event_id = %outcome.event_id,
            user_id = %outcome.user_id,
            status = %outcome.status,
            revisions = outcome.drafts.len(),
            "event processed"
        );
        Ok(outcome)
    }

    async fn run(&self, event: &Event) -> Outcome {
        let context = match self.context_store.load_history(&event.user_id).await {
            Ok(context) => context,
            Err(err) => {
                return Outcome::error(
                    event,
                    None,
                    Vec::new(),
                    Vec::new(),
                    &PipelineError::Context(err),
                );
            }
        };

        if let Some(reason) = self.throttle.suppress_reason(&context, Utc::now()) {
            tracing::info!(user_id = %event.user_id, %reason, "event suppressed before decision");
            return Outcome::skipped(event, Decision::skip(reason));
        }

        let decision = match self.decision.decide(event, &context).await {
            Ok(decision) => decision,
            Err(fault) => return Outcome::error(event, None, Vec::new(), Vec::new(), &fault),
        };
        if !decision.act {
            return Outcome::skipped(event, decision);
        }

        let mut drafts = Vec::new();
        let mut verdicts = Vec::new();
        let mut feedback: Option<VerdictFeedback> = None;
        let mut revision: u32 = 0;

        loop {
            let draft = match self
                .generation
                .draft(event, &context, &decision, feedback.as_ref(), revision)
                .await
            {
                Ok(draft) => draft,
                Err(fault) => {
                    return Outcome::error(event, Some(decision), drafts, verdicts, &fault);
                }
            };

            // Check before pushing; the audit trail keeps the draft either way.
            let checked = self.quality.check(&draft, &context).await;
            drafts.push(draft);
            let verdict = match checked {
                Ok(verdict) => verdict,
                Err(fault) => {
                    return Outcome::error(event, Some(decision), drafts, verdicts, &fault);
                }
            };

            let approved = verdict.approved;
            feedback = verdict.feedback.clone();
            verdicts.push(verdict);

            if approved {
                return Outcome::delivered_pending(event, decision, drafts, verdicts);
            }
            if revision >= self.max_revisions {
                tracing::warn!(
                    user_id = %event.user_id,
                    revisions = revision,
                    "revision budget exhausted, no draft approved"
                );
                return Outcome::failed_quality(event, decision, drafts, verdicts);
            }
            revision += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::completion::{CompletionError, ScriptedClient};
    use crate::config::PipelineConfig;
    use crate::event::{EventType, Segment, SentMessage, UserContext, UserProfile};
    use crate::outcome::{Channel, OutcomeStatus};
    use crate::prompt::PromptName;
    use crate::store::InMemoryStore;
    use async_trait::async_trait;
    use chrono::Duration;

    const DECISION_ACT: &str = r#"{"act": true, "intent": "retention", "rationale": "cart left behind", "confidence": 0.82}"#;
    const DECISION_PASS: &str = r#"{"act": false, "intent": "none", "rationale": "purchase just completed", "confidence": 0.9}"#;
    const DRAFT_REPLY: &str = r#"{"channel": "email", "subject": "Your cart is waiting", "body": "Hi, the trail shoes are still yours to grab."}"#;
    const APPROVE: &str = r#"{"approved": true, "comments": "Clear and friendly."}"#;
    const REJECT: &str = r#"{"approved": false, "comments": "Too generic, name the product.", "suggested_improvement": "Mention the trail shoes."}"#;

    fn cart_event() -> Event {
        Event::new("u-1", EventType::Abandoned).with_product("sku-9")
    }

    fn pipeline(
        client: &Arc<ScriptedClient>,
        store: &Arc<InMemoryStore>,
        config: &Config,
    ) -> Pipeline {
        Pipeline::new(
            Arc::clone(client) as Arc<dyn CompletionClient>,
            PromptRegistry::with_defaults(),
            Arc::clone(store) as Arc<dyn ContextStore>,
            Arc::clone(store) as Arc<dyn OutcomeStore>,
            config,
        )
    }

    #[tokio::test]
    async fn approved_first_pass_is_delivered_pending() {
        let client = Arc::new(ScriptedClient::with_replies([
            DECISION_ACT,
            DRAFT_REPLY,
            APPROVE,
        ]));
        let store = Arc::new(InMemoryStore::new());
        let event = cart_event();

        let outcome = pipeline(&client, &store, &Config::default())
            .process(&event)
            .await
            .unwrap();

        assert_eq!(outcome.status, OutcomeStatus::DeliveredPending);
        assert_eq!(outcome.final_draft.as_ref().map(|d| d.revision), Some(0));
        assert_eq!(outcome.drafts.len(), 1);
        assert_eq!(outcome.verdict_history.len(), 1);
        assert!(outcome.verdict_history[0].approved);
        assert_eq!(client.calls(), 3);
        assert_eq!(store.outcomes().len(), 1);
    }

    #[tokio::test]
    async fn negative_decision_skips_without_generating() {
        let client = Arc::new(ScriptedClient::with_replies([DECISION_PASS]));
        let store = Arc::new(InMemoryStore::new());
        let event = cart_event();

        let outcome = pipeline(&client, &store, &Config::default())
            .process(&event)
            .await
            .unwrap();

        assert_eq!(outcome.status, OutcomeStatus::Skipped);
        assert_eq!(outcome.decision.as_ref().map(|d| d.act), Some(false));
        assert!(outcome.drafts.is_empty());
        assert!(outcome.final_draft.is_none());
        assert_eq!(client.calls(), 1);
        assert_eq!(store.outcomes().len(), 1);
    }

    #[tokio::test]
    async fn revision_budget_of_one_allows_exactly_two_attempts() {
        let client = Arc::new(ScriptedClient::with_replies([
            DECISION_ACT,
            DRAFT_REPLY,
            REJECT,
            DRAFT_REPLY,
            REJECT,
        ]));
        let store = Arc::new(InMemoryStore::new());
        let config = Config {
            pipeline: PipelineConfig { max_revisions: 1 },
            ..Config::default()
        };
        let event = cart_event();

        let outcome = pipeline(&client, &store, &config)
            .process(&event)
            .await
            .unwrap();

        assert_eq!(outcome.status, OutcomeStatus::FailedQuality);
        assert!(outcome.final_draft.is_none());
        assert_eq!(outcome.drafts.len(), 2);
        assert_eq!(outcome.drafts[1].revision, 1);
        assert_eq!(outcome.verdict_history.len(), 2);
        assert!(outcome.verdict_history.iter().all(|v| !v.approved));
        assert_eq!(client.calls(), 5);
        assert!(client.requests()[3].prompt.contains("Too generic, name the product."));
        assert_eq!(store.outcomes().len(), 1);
    }

    #[tokio::test]
    async fn rejection_feedback_leads_to_an_approved_revision() {
        let client = Arc::new(ScriptedClient::with_replies([
            DECISION_ACT,
            DRAFT_REPLY,
            REJECT,
            DRAFT_REPLY,
            APPROVE,
        ]));
        let store = Arc::new(InMemoryStore::new());
        let event = cart_event();

        let outcome = pipeline(&client, &store, &Config::default())
            .process(&event)
            .await
            .unwrap();

        assert_eq!(outcome.status, OutcomeStatus::DeliveredPending);
        assert_eq!(outcome.final_draft.as_ref().map(|d| d.revision), Some(1));
        assert_eq!(outcome.drafts.len(), 2);
        assert_eq!(outcome.verdict_history.len(), 2);
        assert!(!outcome.verdict_history[0].approved);
        assert!(outcome.verdict_history[1].approved);
        assert_eq!(client.calls(), 5);
    }

    #[tokio::test]
    async fn unparseable_decision_becomes_an_error_outcome() {
        let client = Arc::new(ScriptedClient::with_replies([
            "The user seems engaged!",
            "I'd say: maybe.",
        ]));
        let store = Arc::new(InMemoryStore::new());
        let event = cart_event();

        let outcome = pipeline(&client, &store, &Config::default())
            .process(&event)
            .await
            .unwrap();

        assert_eq!(outcome.status, OutcomeStatus::Error);
        assert!(outcome.decision.is_none());
        assert!(outcome.drafts.is_empty());
        assert!(
            outcome
                .error
                .as_deref()
                .unwrap()
                .contains("decision reply did not match")
        );
        assert_eq!(client.calls(), 2);
        assert_eq!(store.outcomes().len(), 1);
    }

    #[tokio::test]
    async fn unparseable_verdict_keeps_the_draft_in_the_audit_trail() {
        let client = Arc::new(ScriptedClient::with_replies([
            DECISION_ACT,
            DRAFT_REPLY,
            "LGTM",
            "ship it",
        ]));
        let store = Arc::new(InMemoryStore::new());
        let event = cart_event();

        let outcome = pipeline(&client, &store, &Config::default())
            .process(&event)
            .await
            .unwrap();

        assert_eq!(outcome.status, OutcomeStatus::Error);
        assert!(outcome.decision.is_some());
        assert_eq!(outcome.drafts.len(), 1);
        assert!(outcome.verdict_history.is_empty());
        assert!(
            outcome
                .error
                .as_deref()
                .unwrap()
                .contains("quality verdict")
        );
        assert_eq!(client.calls(), 4);
    }

    #[tokio::test]
    async fn completion_fault_mid_run_is_captured() {
        let client = Arc::new(ScriptedClient::new());
        client.push(DECISION_ACT);
        client.push_error(CompletionError::Upstream("HTTP 500: boom".into()));
        let store = Arc::new(InMemoryStore::new());
        let event = cart_event();

        let outcome = pipeline(&client, &store, &Config::default())
            .process(&event)
            .await
            .unwrap();

        assert_eq!(outcome.status, OutcomeStatus::Error);
        assert!(outcome.decision.is_some());
        assert!(outcome.drafts.is_empty());
        assert!(outcome.error.as_deref().unwrap().contains("HTTP 500"));
        assert_eq!(client.calls(), 2);
    }

    #[tokio::test]
    async fn broken_generator_template_becomes_an_error_outcome() {
        let client = Arc::new(ScriptedClient::with_replies([DECISION_ACT]));
        let store = Arc::new(InMemoryStore::new());
        let registry = PromptRegistry::with_defaults();
        registry.publish(
            PromptName::TextGenerator,
            "Write to {{ name }} about {{ missing_var }}.",
        );
        let pipeline = Pipeline::new(
            Arc::clone(&client) as Arc<dyn CompletionClient>,
            registry,
            Arc::clone(&store) as Arc<dyn ContextStore>,
            Arc::clone(&store) as Arc<dyn OutcomeStore>,
            &Config::default(),
        );
        let event = cart_event();

        let outcome = pipeline.process(&event).await.unwrap();

        assert_eq!(outcome.status, OutcomeStatus::Error);
        assert!(outcome.decision.is_some());
        assert!(outcome.drafts.is_empty());
        assert!(outcome.verdict_history.is_empty());
        let error = outcome.error.as_deref().unwrap();
        assert!(error.contains("text_generator"));
        assert!(error.contains("missing_var"));
        assert_eq!(client.calls(), 1, "a template fault must not reach the model");
        assert_eq!(store.outcomes().len(), 1);
    }

    struct FailingContextStore;

    #[async_trait]
    impl ContextStore for FailingContextStore {
        async fn load_history(&self, _user_id: &str) -> Result<UserContext, StoreError> {
            Err(StoreError::Backend("context db offline".into()))
        }
    }

    #[tokio::test]
    async fn context_store_failure_yields_an_error_outcome() {
        let client = Arc::new(ScriptedClient::new());
        let store = Arc::new(InMemoryStore::new());
        let pipeline = Pipeline::new(
            Arc::clone(&client) as Arc<dyn CompletionClient>,
            PromptRegistry::with_defaults(),
            Arc::new(FailingContextStore) as Arc<dyn ContextStore>,
            Arc::clone(&store) as Arc<dyn OutcomeStore>,
            &Config::default(),
        );
        let event = cart_event();

        let outcome = pipeline.process(&event).await.unwrap();

        assert_eq!(outcome.status, OutcomeStatus::Error);
        assert!(outcome.decision.is_none());
        assert!(
            outcome
                .error
                .as_deref()
                .unwrap()
                .contains("context unavailable")
        );
        assert_eq!(client.calls(), 0);
        assert_eq!(store.outcomes().len(), 1);
    }

    struct FailingOutcomeStore;

    #[async_trait]
    impl OutcomeStore for FailingOutcomeStore {
        async fn persist(&self, _outcome: &Outcome) -> Result<(), StoreError> {
            Err(StoreError::Backend("outcome db offline".into()))
        }
    }

    #[tokio::test]
    async fn persist_failure_is_the_only_caller_visible_error() {
        let client = Arc::new(ScriptedClient::with_replies([DECISION_PASS]));
        let store = Arc::new(InMemoryStore::new());
        let pipeline = Pipeline::new(
            Arc::clone(&client) as Arc<dyn CompletionClient>,
            PromptRegistry::with_defaults(),
            Arc::clone(&store) as Arc<dyn ContextStore>,
            Arc::new(FailingOutcomeStore) as Arc<dyn OutcomeStore>,
            &Config::default(),
        );
        let event = cart_event();

        let err = pipeline.process(&event).await.unwrap_err();

        assert!(err.to_string().contains("outcome db offline"));
    }

    #[tokio::test]
    async fn recent_message_suppresses_before_any_model_call() {
        let client = Arc::new(ScriptedClient::new());
        let store = Arc::new(InMemoryStore::new());
        store.seed_message(
            "u-1",
            SentMessage {
                channel: Channel::Email,
                subject: Some("Earlier offer".into()),
                body: "We saved your cart.".into(),
                sent_at: Utc::now() - Duration::minutes(10),
            },
        );
        let event = cart_event();

        let outcome = pipeline(&client, &store, &Config::default())
            .process(&event)
            .await
            .unwrap();

        assert_eq!(outcome.status, OutcomeStatus::Skipped);
        assert!(
            outcome
                .decision
                .as_ref()
                .unwrap()
                .rationale
                .contains("frequency cap")
        );
        assert_eq!(client.calls(), 0);
        assert_eq!(store.outcomes().len(), 1);
    }

    #[tokio::test]
    async fn high_spender_bypasses_the_frequency_cap() {
        let client = Arc::new(ScriptedClient::with_replies([
            DECISION_ACT,
            DRAFT_REPLY,
            APPROVE,
        ]));
        let store = Arc::new(InMemoryStore::new());
        store.seed_profile(UserProfile {
            user_id: "u-1".into(),
            name: "Dana".into(),
            email: Some("dana@example.com".into()),
            segment: Segment::Vip,
            total_spent: 20_000.0,
            interests: vec!["trail running".into()],
        });
        store.seed_message(
            "u-1",
            SentMessage {
                channel: Channel::Push,
                subject: None,
                body: "Flash sale today.".into(),
                sent_at: Utc::now() - Duration::minutes(10),
            },
        );
        let event = cart_event();

        let outcome = pipeline(&client, &store, &Config::default())
            .process(&event)
            .await
            .unwrap();

        assert_eq!(outcome.status, OutcomeStatus::DeliveredPending);
        assert_eq!(client.calls(), 3);
    }

    #[tokio::test]
    async fn each_event_persists_exactly_one_outcome() {
        let client = Arc::new(ScriptedClient::with_replies([DECISION_PASS, DECISION_PASS]));
        let store = Arc::new(InMemoryStore::new());
        let pipeline = pipeline(&client, &store, &Config::default());
        let first = Event::new("u-1", EventType::View);
        let second = Event::new("u-2", EventType::Search);

        pipeline.process(&first).await.unwrap();
        pipeline.process(&second).await.unwrap();

        let outcomes = store.outcomes();
        assert_eq!(outcomes.len(), 2);
        assert_eq!(outcomes[0].event_id, first.id);
        assert_eq!(outcomes[1].event_id, second.id);
    }
}
