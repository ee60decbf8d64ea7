use serde::Deserialize;
use std::sync::Arc;

use super::parse::{encode_json, extract_json};
use crate::completion::{CompletionClient, CompletionRequest};
use crate::config::LlmConfig;
use crate::error::PipelineError;
use crate::event::{Event, UserContext};
use crate::outcome::{Channel, Decision, Draft, VerdictFeedback};
use crate::prompt::{PromptName, PromptRegistry, TemplateVars};

const GENERATION_SYSTEM: &str = "You are a retail copywriter. \
You answer with a single strict JSON object.";

pub(crate) struct GenerationStage {
    client: Arc<dyn CompletionClient>,
    registry: PromptRegistry,
    model: String,
    temperature: f64,
    max_tokens: u32,
}

impl GenerationStage {
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

    /// Produce draft number `revision`, rewriting against `feedback` when a
    /// previous draft was rejected. Replies are taken leniently: anything
    /// that is not the structured shape becomes the body of an email draft.
    pub(crate) async fn draft(
        &self,
        event: &Event,
        context: &UserContext,
        decision: &Decision,
        feedback: Option<&VerdictFeedback>,
        revision: u32,
    ) -> Result<Draft, PipelineError> {
        let profile = &context.profile;
        let vars = TemplateVars::new()
            .with("name", &profile.name)
            .with("segment", profile.segment.to_string())
            .with("interests", encode_json(&profile.interests))
            .with("recent_views", encode_json(&context.recent_views()))
            .with("purchase_history", encode_json(&context.purchase_history()))
            .with("event", encode_json(event))
            .with("intent", decision.intent.to_string())
            .with("rationale", &decision.rationale)
            .with("feedback", feedback_block(feedback));
        let prompt = self.registry.render(PromptName::TextGenerator, &vars)?;

        let request = CompletionRequest::new(self.model.clone(), prompt)
            .with_system(GENERATION_SYSTEM)
            .with_temperature(self.temperature)
            .with_max_tokens(self.max_tokens);
        let reply = self.client.complete(&request).await?;
        Ok(parse_draft(&reply, revision))
    }
}

// Rejection feedback flattened for the template. An empty string keeps the
// template's feedback block out of the rendered prompt.
fn feedback_block(feedback: Option<&VerdictFeedback>) -> String {
    let Some(feedback) = feedback else {
        return String::new();
    };
    let mut block = format!("Reviewer comments: {}", feedback.comments);
    if let Some(hint) = &feedback.suggested_improvement {
        block.push_str("\nSuggested improvement: ");
        block.push_str(hint);
    }
    block
}

#[derive(Deserialize)]
struct RawDraft {
    channel: Channel,
    #[serde(default)]
    subject: Option<String>,
    body: String,
}

fn parse_draft(reply: &str, revision: u32) -> Draft {
    if let Some(json) = extract_json(reply) {
        if let Ok(raw) = serde_json::from_str::<RawDraft>(json) {
            let subject = match raw.channel {
                // Push notifications have no subject line, full stop.
                Channel::Push => None,
                Channel::Email => raw.subject.filter(|s| !s.trim().is_empty()),
            };
            return Draft {
                channel: raw.channel,
                subject,
                body: raw.body,
                revision,
            };
        }
    }
    Draft {
        channel: Channel::Email,
        subject: None,
        body: reply.trim().to_string(),
        revision,
    }
}
