//! Stored notification event models.

use serde::Serialize;
use sqlx::FromRow;
use triage_core::types::Timestamp;
use uuid::Uuid;

/// A row from the `notification_events` table. Immutable after write.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct StoredEvent {
    pub id: Uuid,
    pub user_id: String,
    pub event_type: String,
    pub title: String,
    pub message: String,
    pub source: String,
    pub channel: String,
    pub priority_hint: Option<String>,
    pub dedupe_key: Option<String>,
    pub computed_fingerprint: String,
    pub expires_at: Option<Timestamp>,
    pub event_timestamp: Timestamp,
    pub metadata: serde_json::Value,
    // Decision
    pub decision: Option<String>,
    pub score: Option<f64>,
    pub scheduled_at: Option<Timestamp>,
    pub decision_reason: serde_json::Value,
    pub ai_used: bool,
    pub fallback_used: bool,
    pub rule_matched: Option<String>,
    pub created_at: Timestamp,
    pub processed_at: Option<Timestamp>,
}

impl StoredEvent {
    /// The event's `metadata.priority_order`, used to order digest items
    /// (default 5 when absent or non-numeric).
    pub fn digest_priority_order(&self) -> i64 {
        self.metadata
            .get("priority_order")
            .and_then(|v| v.as_i64())
            .unwrap_or(5)
    }

    /// Whether the event's `expires_at` has passed.
    pub fn is_expired(&self, now: Timestamp) -> bool {
        self.expires_at.is_some_and(|exp| exp <= now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;

    fn stored(metadata: serde_json::Value, expires_at: Option<Timestamp>) -> StoredEvent {
        StoredEvent {
            id: Uuid::new_v4(),
            user_id: "u1".into(),
            event_type: "reminder".into(),
            title: "t".into(),
            message: "m".into(),
            source: "s".into(),
            channel: "push".into(),
            priority_hint: None,
            dedupe_key: None,
            computed_fingerprint: "f".into(),
            expires_at,
            event_timestamp: Utc::now(),
            metadata,
            decision: Some("later".into()),
            score: Some(0.5),
            scheduled_at: None,
            decision_reason: json!([]),
            ai_used: false,
            fallback_used: true,
            rule_matched: None,
            created_at: Utc::now(),
            processed_at: None,
        }
    }

    #[test]
    fn digest_priority_order_defaults_to_five() {
        assert_eq!(stored(json!({}), None).digest_priority_order(), 5);
        assert_eq!(
            stored(json!({"priority_order": 2}), None).digest_priority_order(),
            2
        );
        assert_eq!(
            stored(json!({"priority_order": "high"}), None).digest_priority_order(),
            5
        );
    }

    #[test]
    fn expiry_check() {
        let now = Utc::now();
        assert!(!stored(json!({}), None).is_expired(now));
        assert!(stored(json!({}), Some(now - chrono::Duration::minutes(1))).is_expired(now));
        assert!(!stored(json!({}), Some(now + chrono::Duration::minutes(1))).is_expired(now));
    }
}
