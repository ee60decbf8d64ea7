use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use strum::Display;
use uuid::Uuid;

use crate::outcome::Channel;

// EventType — closed set of behavioral events the pipeline reacts to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum EventType {
    View,
    Search,
    CartAdded,
    Abandoned,
    Purchase,
}

// Scalar — event property values stay flat (no nesting)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Bool(bool),
    Number(f64),
    Text(String),
}

impl From<bool> for Scalar {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<f64> for Scalar {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<&str> for Scalar {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for Scalar {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

/// One behavioral event from the store front. Ingestion may omit the id;
/// a fresh one is minted so every pipeline run stays addressable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    pub user_id: String,
    pub event_type: EventType,
    #[serde(default)]
    pub product_id: Option<String>,
    pub timestamp: DateTime<Utc>,
    /// BTreeMap for stable ordering when the event is echoed into prompts.
    #[serde(default)]
    pub properties: BTreeMap<String, Scalar>,
}

impl Event {
    #[must_use]
    pub fn new(user_id: impl Into<String>, event_type: EventType) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id: user_id.into(),
            event_type,
            product_id: None,
            timestamp: Utc::now(),
            properties: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn with_product(mut self, product_id: impl Into<String>) -> Self {
        self.product_id = Some(product_id.into());
        self
    }

    #[must_use]
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<Scalar>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }
}

// Segment — lifecycle bucket the store assigns to a customer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, Default)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Segment {
    #[default]
    New,
    Returning,
    Vip,
    Dormant,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub user_id: String,
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub segment: Segment,
    #[serde(default)]
    pub total_spent: f64,
    #[serde(default)]
    pub interests: Vec<String>,
}

impl UserProfile {
    /// Stand-in profile for a user the store has never described.
    #[must_use]
    pub fn placeholder(user_id: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            name: format!("User_{user_id}"),
            email: None,
            segment: Segment::New,
            total_spent: 0.0,
            interests: Vec::new(),
        }
    }
}

// SentMessage — one message already delivered to the user, newest last
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SentMessage {
    pub channel: Channel,
    #[serde(default)]
    pub subject: Option<String>,
    pub body: String,
    pub sent_at: DateTime<Utc>,
}

/// Everything the pipeline knows about a user at decision time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserContext {
    pub profile: UserProfile,
    #[serde(default)]
    pub recent_events: Vec<Event>,
    #[serde(default)]
    pub message_history: Vec<SentMessage>,
}

impl UserContext {
    #[must_use]
    pub fn for_new_user(user_id: &str) -> Self {
        Self {
            profile: UserProfile::placeholder(user_id),
            recent_events: Vec::new(),
            message_history: Vec::new(),
        }
    }

    /// Timestamp of the most recent outbound message, if any.
    #[must_use]
    pub fn last_message_at(&self) -> Option<DateTime<Utc>> {
        self.message_history.iter().map(|m| m.sent_at).max()
    }

    /// Product ids the user recently looked at, oldest first.
    #[must_use]
    pub fn recent_views(&self) -> Vec<&str> {
        self.products_for(EventType::View)
    }

    /// Product ids the user actually bought, oldest first.
    #[must_use]
    pub fn purchase_history(&self) -> Vec<&str> {
        self.products_for(EventType::Purchase)
    }

    fn products_for(&self, event_type: EventType) -> Vec<&str> {
        self.recent_events
            .iter()
            .filter(|e| e.event_type == event_type)
            .filter_map(|e| e.product_id.as_deref())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_type_serializes_snake_case() {
        let json = serde_json::to_string(&EventType::CartAdded).unwrap();
        assert_eq!(json, "\"cart_added\"");
        assert_eq!(EventType::CartAdded.to_string(), "cart_added");
    }

    #[test]
    fn scalar_untagged_roundtrip() {
        let event = Event::new("u-1", EventType::View)
            .with_product("sku-42")
            .with_property("price", 599.99)
            .with_property("on_sale", true)
            .with_property("query", "running shoes");
        let json = serde_json::to_string(&event).unwrap();
        let back: Event = serde_json::from_str(&json).unwrap();
        assert_eq!(back.properties["price"], Scalar::Number(599.99));
        assert_eq!(back.properties["on_sale"], Scalar::Bool(true));
        assert_eq!(
            back.properties["query"],
            Scalar::Text("running shoes".into())
        );
    }

    #[test]
    fn event_id_minted_when_missing() {
        let json = r#"{
            "user_id": "u-9",
            "event_type": "purchase",
            "timestamp": "2026-03-01T10:00:00Z"
        }"#;
        let event: Event = serde_json::from_str(json).unwrap();
        assert!(!event.id.is_nil());
        assert_eq!(event.event_type, EventType::Purchase);
        assert!(event.properties.is_empty());
    }

    #[test]
    fn placeholder_profile_defaults_to_new_segment() {
        let profile = UserProfile::placeholder("u-77");
        assert_eq!(profile.segment, Segment::New);
        assert_eq!(profile.name, "User_u-77");
        assert_eq!(profile.total_spent, 0.0);
    }

    #[test]
    fn recent_views_filters_by_type_and_product() {
        let mut ctx = UserContext::for_new_user("u-1");
        ctx.recent_events = vec![
            Event::new("u-1", EventType::View).with_product("sku-1"),
            Event::new("u-1", EventType::Search),
            Event::new("u-1", EventType::View),
            Event::new("u-1", EventType::Purchase).with_product("sku-2"),
        ];
        assert_eq!(ctx.recent_views(), vec!["sku-1"]);
        assert_eq!(ctx.purchase_history(), vec!["sku-2"]);
    }

    #[test]
    fn last_message_at_picks_newest() {
        let mut ctx = UserContext::for_new_user("u-1");
        let old = Utc::now() - chrono::Duration::hours(3);
        let recent = Utc::now() - chrono::Duration::minutes(5);
        ctx.message_history = vec![
            SentMessage {
                channel: Channel::Email,
                subject: Some("hi".into()),
                body: "older".into(),
                sent_at: old,
            },
            SentMessage {
                channel: Channel::Push,
                subject: None,
                body: "newer".into(),
                sent_at: recent,
            },
        ];
        assert_eq!(ctx.last_message_at(), Some(recent));
    }

    #[test]
    fn empty_history_has_no_last_message() {
        assert_eq!(UserContext::for_new_user("u-1").last_message_at(), None);
    }
}
