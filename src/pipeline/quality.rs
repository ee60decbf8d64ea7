use serde::Deserialize;
use std::sync::Arc;

use super::parse::{STRICT_JSON_DIRECTIVE, encode_json, extract_json, reply_snippet};
use crate::completion::{CompletionClient, CompletionRequest};
use crate::config::LlmConfig;
use crate::error::PipelineError;
use crate::event::UserContext;
use crate::outcome::{Channel, Draft, QualityScores, QualityVerdict, VerdictFeedback};
use crate::prompt::{PromptName, PromptRegistry, TemplateVars};

const QUALITY_SYSTEM: &str = "You are a strict quality reviewer for outbound retail messages. \
You answer with a single strict JSON object.";

// Judgments need to be reproducible, so the checker always runs cold.
const QUALITY_TEMPERATURE: f64 = 0.0;

pub(crate) struct QualityStage {
    client: Arc<dyn CompletionClient>,
    registry: PromptRegistry,
    model: String,
    max_tokens: u32,
}

impl QualityStage {
    pub(crate) fn new(
        client: Arc<dyn CompletionClient>,
        registry: PromptRegistry,
        llm: &LlmConfig,
    ) -> Self {
        Self {
            client,
            registry,
            model: llm.model.clone(),
            max_tokens: llm.max_output_tokens,
        }
    }

    /// Judge one draft. Same amended-retry contract as the decision stage,
    /// and a rejection without usable feedback counts as a malformed reply:
    /// the revision loop cannot improve a draft it was told nothing about.
    pub(crate) async fn check(
        &self,
        draft: &Draft,
        context: &UserContext,
    ) -> Result<QualityVerdict, PipelineError> {
        let vars = TemplateVars::new()
            .with("channel", draft.channel.to_string())
            .with("subject", draft.subject.clone().unwrap_or_default())
            .with("body", &draft.body)
            .with("constraints", channel_constraints(draft.channel))
            .with("user_context", encode_json(&context.profile));
        let prompt = self.registry.render(PromptName::QualityChecker, &vars)?;

        let reply = self.complete(&prompt).await?;
        match parse_verdict(&reply, draft.revision) {
            Ok(verdict) => Ok(verdict),
            Err(fault) => {
                tracing::warn!(
                    error = %fault,
                    "quality reply failed schema parse, retrying with strict directive"
                );
                let amended = format!("{prompt}\n\n{STRICT_JSON_DIRECTIVE}");
                let reply = self.complete(&amended).await?;
                parse_verdict(&reply, draft.revision).map_err(PipelineError::QualityParse)
            }
        }
    }

    async fn complete(&self, prompt: &str) -> Result<String, PipelineError> {
        let request = CompletionRequest::new(self.model.clone(), prompt)
            .with_system(QUALITY_SYSTEM)
            .with_temperature(QUALITY_TEMPERATURE)
            .with_max_tokens(self.max_tokens);
        Ok(self.client.complete(&request).await?)
    }
}

fn channel_constraints(channel: Channel) -> &'static str {
    match channel {
        Channel::Email => {
            "email: at most 150 words, friendly, a concrete subject line, exactly one call to action"
        }
        Channel::Push => "push: at most 80 characters total, direct, no subject, no greeting filler",
    }
}

#[derive(Deserialize)]
struct RawVerdict {
    approved: bool,
    #[serde(default)]
    comments: String,
    #[serde(default)]
    suggested_improvement: Option<String>,
    #[serde(default)]
    overall_score: Option<f64>,
    #[serde(default)]
    criteria_scores: Option<RawScores>,
}

#[derive(Deserialize)]
struct RawScores {
    #[serde(default)]
    grammar: f64,
    #[serde(default)]
    tone: f64,
    #[serde(default)]
    personalization: f64,
    #[serde(default)]
    relevance: f64,
    #[serde(default)]
    spam_risk: f64,
    #[serde(default)]
    ethics: f64,
}

fn parse_verdict(reply: &str, revision: u32) -> Result<QualityVerdict, String> {
    let json = extract_json(reply)
        .ok_or_else(|| format!("no JSON object in reply: {}", reply_snippet(reply)))?;
    let raw: RawVerdict =
        serde_json::from_str(json).map_err(|err| format!("{err}: {}", reply_snippet(json)))?;

    let comments = raw.comments.trim().to_string();
    if !raw.approved && comments.is_empty() {
        return Err("rejection carried no feedback comments".into());
    }

    let suggested_improvement = raw
        .suggested_improvement
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty());
    let feedback = if comments.is_empty() {
        None
    } else {
        Some(VerdictFeedback {
            comments,
            suggested_improvement,
        })
    };

    let scores = raw.criteria_scores.map(|cs| {
        QualityScores {
            grammar: cs.grammar,
            tone: cs.tone,
            personalization: cs.personalization,
            relevance: cs.relevance,
            spam_risk: cs.spam_risk,
            ethics: cs.ethics,
            overall: raw.overall_score.unwrap_or_default(),
        }
        .clamped()
    });

    Ok(QualityVerdict {
        approved: raw.approved,
        feedback,
        checked_revision: revision,
        scores,
    })
}
