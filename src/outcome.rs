use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::Display;
use uuid::Uuid;

use crate::error::PipelineError;
use crate::event::Event;

// Channel — delivery surfaces a draft can target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Channel {
    Email,
    Push,
}

// Intent — why the agent wants to reach out
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Intent {
    Promotional,
    Retention,
    Informational,
    None,
}

/// The decision stage's answer: act or stay quiet, and why.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Decision {
    pub act: bool,
    pub intent: Intent,
    pub rationale: String,
    /// Always within `[0.0, 1.0]`; parse clamps out-of-range model output.
    pub confidence: f64,
}

impl Decision {
    /// Deterministic skip, used when policy rules out contact before any
    /// model call is made.
    #[must_use]
    pub fn skip(rationale: impl Into<String>) -> Self {
        Self {
            act: false,
            intent: Intent::None,
            rationale: rationale.into(),
            confidence: 1.0,
        }
    }
}

/// One generated message candidate. `revision` starts at 0 and increments
/// for every regeneration after a rejected quality check.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Draft {
    pub channel: Channel,
    #[serde(default)]
    pub subject: Option<String>,
    pub body: String,
    pub revision: u32,
}

// VerdictFeedback — what the checker wants changed; fed into the next revision
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerdictFeedback {
    pub comments: String,
    #[serde(default)]
    pub suggested_improvement: Option<String>,
}

// QualityScores — per-criterion marks, each clamped to [0, 1]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityScores {
    pub grammar: f64,
    pub tone: f64,
    pub personalization: f64,
    pub relevance: f64,
    pub spam_risk: f64,
    pub ethics: f64,
    pub overall: f64,
}

impl QualityScores {
    #[must_use]
    pub fn clamped(self) -> Self {
        Self {
            grammar: self.grammar.clamp(0.0, 1.0),
            tone: self.tone.clamp(0.0, 1.0),
            personalization: self.personalization.clamp(0.0, 1.0),
            relevance: self.relevance.clamp(0.0, 1.0),
            spam_risk: self.spam_risk.clamp(0.0, 1.0),
            ethics: self.ethics.clamp(0.0, 1.0),
            overall: self.overall.clamp(0.0, 1.0),
        }
    }
}

/// Judgment for one draft revision. A rejection always carries feedback;
/// the quality stage treats a bare `approved: false` as a parse fault.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualityVerdict {
    pub approved: bool,
    #[serde(default)]
    pub feedback: Option<VerdictFeedback>,
    pub checked_revision: u32,
    #[serde(default)]
    pub scores: Option<QualityScores>,
}

// OutcomeStatus — the four terminal states of a pipeline run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum OutcomeStatus {
    Skipped,
    DeliveredPending,
    FailedQuality,
    Error,
}

/// Exactly one of these is produced (and persisted) per processed event,
/// whatever happened along the way.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Outcome {
    pub event_id: Uuid,
    pub user_id: String,
    pub status: OutcomeStatus,
    /// `None` only when the run failed before a decision existed.
    pub decision: Option<Decision>,
    /// The approved draft; `None` unless status is `delivered_pending`.
    pub final_draft: Option<Draft>,
    /// Every draft generated during the run, in revision order.
    #[serde(default)]
    pub drafts: Vec<Draft>,
    /// Every verdict returned, in check order.
    #[serde(default)]
    pub verdict_history: Vec<QualityVerdict>,
    #[serde(default)]
    pub error: Option<String>,
    pub completed_at: DateTime<Utc>,
}

impl Outcome {
    #[must_use]
    pub fn skipped(event: &Event, decision: Decision) -> Self {
        Self {
            event_id: event.id,
            user_id: event.user_id.clone(),
            status: OutcomeStatus::Skipped,
            decision: Some(decision),
            final_draft: None,
            drafts: Vec::new(),
            verdict_history: Vec::new(),
            error: None,
            completed_at: Utc::now(),
        }
    }

    #[must_use]
    pub fn delivered_pending(
        event: &Event,
        decision: Decision,
        drafts: Vec<Draft>,
        verdict_history: Vec<QualityVerdict>,
    ) -> Self {
        let final_draft = drafts.last().cloned();
        Self {
            event_id: event.id,
            user_id: event.user_id.clone(),
            status: OutcomeStatus::DeliveredPending,
            decision: Some(decision),
            final_draft,
            drafts,
            verdict_history,
            error: None,
            completed_at: Utc::now(),
        }
    }

    #[must_use]
    pub fn failed_quality(
        event: &Event,
        decision: Decision,
        drafts: Vec<Draft>,
        verdict_history: Vec<QualityVerdict>,
    ) -> Self {
        Self {
            event_id: event.id,
            user_id: event.user_id.clone(),
            status: OutcomeStatus::FailedQuality,
            decision: Some(decision),
            final_draft: None,
            drafts,
            verdict_history,
            error: None,
            completed_at: Utc::now(),
        }
    }

    #[must_use]
    pub fn error(
        event: &Event,
        decision: Option<Decision>,
        drafts: Vec<Draft>,
        verdict_history: Vec<QualityVerdict>,
        fault: &PipelineError,
    ) -> Self {
        Self {
            event_id: event.id,
            user_id: event.user_id.clone(),
            status: OutcomeStatus::Error,
            decision,
            final_draft: None,
            drafts,
            verdict_history,
            error: Some(fault.to_string()),
            completed_at: Utc::now(),
        }
    }
}
