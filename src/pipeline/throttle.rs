use chrono::{DateTime, Duration, Utc};

use crate::config::ThrottleConfig;
use crate::event::UserContext;

// EngagementThrottle — frequency cap applied before any model call.
// High spenders are exempt from the cap.
pub(crate) struct EngagementThrottle {
    enabled: bool,
    window: Duration,
    vip_spend_threshold: f64,
}

impl EngagementThrottle {
    pub(crate) fn new(config: &ThrottleConfig) -> Self {
        let minutes = i64::try_from(config.window_minutes).unwrap_or(i64::MAX);
        Self {
            enabled: config.enabled,
            window: Duration::minutes(minutes),
            vip_spend_threshold: config.vip_spend_threshold,
        }
    }

    /// Returns the reason to suppress the event, or `None` to let it through.
    pub(crate) fn suppress_reason(&self, context: &UserContext, now: DateTime<Utc>) -> Option<String> {
        if !self.enabled {
            return None;
        }
        if context.profile.total_spent > self.vip_spend_threshold {
            return None;
        }
        let last = context.last_message_at()?;
        let elapsed = now.signed_duration_since(last);
        if elapsed < self.window {
            Some(format!(
                "frequency cap: a message went out {} minutes ago, window is {} minutes",
                elapsed.num_minutes(),
                self.window.num_minutes()
            ))
        } else {
            None
        }
    }
}
