use serde::Deserialize;
use std::sync::Arc;

use super::parse::{STRICT_JSON_DIRECTIVE, clamp_unit, encode_json, extract_json, reply_snippet};
use crate::completion::{CompletionClient, CompletionRequest};
use crate::config::LlmConfig;
use crate::error::PipelineError;
use crate::event::{Event, UserContext};
use crate::outcome::{Decision, Intent};
use crate::prompt::{PromptName, PromptRegistry, TemplateVars};

const DECISION_SYSTEM: &str = "You are the engagement gatekeeper for an online store. \
You answer with a single strict JSON object.";

pub(crate) struct DecisionStage {
    client: Arc<dyn CompletionClient>,
    registry: PromptRegistry,
    model: String,
    temperature: f64,
    max_tokens: u32,
}

impl DecisionStage {
    pub(crate) fn new(
        client: Arc<dyn CompletionClient>,
        registry: PromptRegistry,
        llm: &LlmConfig,
    ) -> Self {
        Self {
            client,
            registry,
            model: llm.model.clone(),
            temperature: llm.temperature,
            max_tokens: llm.max_output_tokens,
        }
    }

    /// Ask whether to engage at all. A malformed reply gets one amended
    /// retry; a second malformed reply aborts the run with `DecisionParse`.
    pub(crate) async fn decide(
        &self,
        event: &Event,
        context: &UserContext,
    ) -> Result<Decision, PipelineError> {
        let vars = TemplateVars::new()
            .with("user_profile", encode_json(&context.profile))
            .with("event", encode_json(event))
            .with("recent_activity", encode_json(&context.recent_events))
            .with("message_history", encode_json(&context.message_history));
        let prompt = self.registry.render(PromptName::DecisionAgent, &vars)?;

        let reply = self.complete(&prompt).await?;
        match parse_decision(&reply) {
            Ok(decision) => Ok(normalize(decision)),
            Err(fault) => {
                tracing::warn!(
                    error = %fault,
                    "decision reply failed schema parse, retrying with strict directive"
                );
                let amended = format!("{prompt}\n\n{STRICT_JSON_DIRECTIVE}");
                let reply = self.complete(&amended).await?;
                let decision = parse_decision(&reply).map_err(PipelineError::DecisionParse)?;
                Ok(normalize(decision))
            }
        }
    }

    async fn complete(&self, prompt: &str) -> Result<String, PipelineError> {
        let request = CompletionRequest::new(self.model.clone(), prompt)
            .with_system(DECISION_SYSTEM)
            .with_temperature(self.temperature)
            .with_max_tokens(self.max_tokens);
        Ok(self.client.complete(&request).await?)
    }
}

#[derive(Deserialize)]
struct RawDecision {
    act: bool,
    intent: Intent,
    rationale: String,
    confidence: f64,
}

fn parse_decision(reply: &str) -> Result<Decision, String> {
    let json = extract_json(reply)
        .ok_or_else(|| format!("no JSON object in reply: {}", reply_snippet(reply)))?;
    let raw: RawDecision =
        serde_json::from_str(json).map_err(|err| format!("{err}: {}", reply_snippet(json)))?;
    Ok(Decision {
        act: raw.act,
        intent: raw.intent,
        rationale: raw.rationale,
        confidence: clamp_unit(raw.confidence),
    })
}

/// A skip carries no intent, whatever the model said. A request to act
/// without an intent is demoted to a skip rather than guessed at.
fn normalize(mut decision: Decision) -> Decision {
    if !decision.act {
        decision.intent = Intent::None;
    } else if decision.intent == Intent::None {
        tracing::warn!("decision wanted to act without an intent, demoting to skip");
        decision.act = false;
    }
    decision
}
