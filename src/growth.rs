//! Account-level growth analysis. Unlike the event pipeline this looks at
//! a whole profile and proposes what to sell next, not whether to message
//! right now.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use strum::Display;

use crate::completion::{CompletionClient, CompletionRequest};
use crate::config::LlmConfig;
use crate::error::InsightError;
use crate::event::UserProfile;
use crate::pipeline::{encode_json, extract_json, reply_snippet};

const GROWTH_SYSTEM: &str =
    "You are a retail growth analyst. You answer with a single strict JSON object.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum GrowthKind {
    #[serde(alias = "cross-sell")]
    CrossSell,
    Upsell,
    #[serde(alias = "reactivate")]
    Reactivation,
    #[serde(alias = "win-back")]
    WinBack,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GrowthOpportunity {
    #[serde(rename = "type")]
    pub kind: GrowthKind,
    pub reason: String,
    pub suggestion: String,
    /// Model's estimate of incremental lifetime value, when it offers one.
    #[serde(default)]
    pub expected_ltv_increase: Option<f64>,
}

pub struct GrowthAdvisor {
    client: Arc<dyn CompletionClient>,
    model: String,
    temperature: f64,
    max_tokens: u32,
}

impl GrowthAdvisor {
    pub fn new(client: Arc<dyn CompletionClient>, llm: &LlmConfig) -> Self {
        Self {
            client,
            model: llm.model.clone(),
            temperature: llm.temperature,
            max_tokens: llm.max_output_tokens,
        }
    }

    /// Ask the model for concrete opportunities on this account. An empty
    /// list is a legitimate answer for a customer with nothing actionable.
    pub async fn analyze(
        &self,
        profile: &UserProfile,
    ) -> Result<Vec<GrowthOpportunity>, InsightError> {
        let request = CompletionRequest::new(self.model.clone(), growth_prompt(profile))
            .with_system(GROWTH_SYSTEM)
            .with_temperature(self.temperature)
            .with_max_tokens(self.max_tokens);
        let reply = self.client.complete(&request).await?;
        parse_opportunities(&reply)
    }
}

fn growth_prompt(profile: &UserProfile) -> String {
    format!(
        r#"Review this customer profile and list concrete growth opportunities.

Customer profile:
{profile}

Consider cross-sell and upsell angles from their interests and spend level, reactivation when they have gone quiet, and win-back offers for lapsed high spenders. An empty list is a valid answer.

Reply with ONLY this JSON shape:
{{"opportunities": [{{"type": "cross_sell" | "upsell" | "reactivation" | "win_back", "reason": "...", "suggestion": "...", "expected_ltv_increase": 120.0}}]}}"#,
        profile = encode_json(profile)
    )
}

#[derive(Deserialize)]
struct RawOpportunities {
    opportunities: Vec<GrowthOpportunity>,
}

fn parse_opportunities(reply: &str) -> Result<Vec<GrowthOpportunity>, InsightError> {
    let json = extract_json(reply).ok_or_else(|| {
        InsightError::Parse(format!("no JSON object in reply: {}", reply_snippet(reply)))
    })?;
    let raw: RawOpportunities = serde_json::from_str(json)
        .map_err(|err| InsightError::Parse(format!("{err}: {}", reply_snippet(json))))?;
    Ok(raw.opportunities)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::completion::{CompletionError, ScriptedClient};
    use crate::event::Segment;

    fn vip_profile() -> UserProfile {
        UserProfile {
            user_id: "u-9".into(),
            name: "Dana".into(),
            email: Some("dana@example.com".into()),
            segment: Segment::Vip,
            total_spent: 12_400.0,
            interests: vec!["trail running".into(), "camping".into()],
        }
    }

    fn advisor(client: Arc<ScriptedClient>) -> GrowthAdvisor {
        GrowthAdvisor::new(client, &LlmConfig::default())
    }

    #[tokio::test]
    async fn parses_a_list_of_opportunities() {
        let client = Arc::new(ScriptedClient::with_replies([
            r#"{"opportunities": [
                {"type": "cross_sell", "reason": "buys shoes, never apparel", "suggestion": "bundle a running jacket", "expected_ltv_increase": 180.0},
                {"type": "upsell", "reason": "always picks the entry model", "suggestion": "offer the premium line with trade-in"}
            ]}"#,
        ]));

        let opportunities = advisor(Arc::clone(&client))
            .analyze(&vip_profile())
            .await
            .unwrap();

        assert_eq!(opportunities.len(), 2);
        assert_eq!(opportunities[0].kind, GrowthKind::CrossSell);
        assert_eq!(opportunities[0].expected_ltv_increase, Some(180.0));
        assert_eq!(opportunities[1].kind, GrowthKind::Upsell);
        assert!(opportunities[1].expected_ltv_increase.is_none());
        assert_eq!(client.calls(), 1);
    }

    #[tokio::test]
    async fn hyphenated_kind_spellings_are_accepted() {
        let client = Arc::new(ScriptedClient::with_replies([
            r#"{"opportunities": [{"type": "win-back", "reason": "lapsed big spender", "suggestion": "personal discount code"}]}"#,
        ]));

        let opportunities = advisor(client).analyze(&vip_profile()).await.unwrap();
        assert_eq!(opportunities[0].kind, GrowthKind::WinBack);
    }

    #[tokio::test]
    async fn fenced_reply_is_accepted() {
        let client = Arc::new(ScriptedClient::with_replies([
            "```json\n{\"opportunities\": []}\n```",
        ]));

        let opportunities = advisor(client).analyze(&vip_profile()).await.unwrap();
        assert!(opportunities.is_empty());
    }

    #[tokio::test]
    async fn prose_reply_is_a_parse_fault() {
        let client = Arc::new(ScriptedClient::with_replies([
            "This customer looks healthy, nothing to do.",
        ]));

        let err = advisor(client).analyze(&vip_profile()).await.unwrap_err();
        assert!(matches!(err, InsightError::Parse(_)));
    }

    #[tokio::test]
    async fn completion_faults_propagate() {
        let client = Arc::new(ScriptedClient::new());
        client.push_error(CompletionError::Timeout);

        let err = advisor(client).analyze(&vip_profile()).await.unwrap_err();
        assert!(matches!(err, InsightError::Completion(_)));
    }

    #[tokio::test]
    async fn prompt_carries_the_profile() {
        let client = Arc::new(ScriptedClient::with_replies([
            r#"{"opportunities": []}"#,
        ]));

        advisor(Arc::clone(&client))
            .analyze(&vip_profile())
            .await
            .unwrap();

        let request = &client.requests()[0];
        assert!(request.prompt.contains("Dana"));
        assert!(request.prompt.contains("trail running"));
        assert_eq!(request.system.as_deref(), Some(GROWTH_SYSTEM));
    }
}
