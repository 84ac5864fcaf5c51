//! Inbound notification event and ingress validation.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::{Channel, PriorityHint, Timestamp};

/// Maximum number of events accepted in one batch-evaluate request.
pub const MAX_BATCH_SIZE: usize = 500;

const MAX_USER_ID_LEN: usize = 64;
const MAX_EVENT_TYPE_LEN: usize = 128;
const MAX_TITLE_LEN: usize = 256;
const MAX_SOURCE_LEN: usize = 64;
const MAX_DEDUPE_KEY_LEN: usize = 256;

/// A notification event as submitted by a producing service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationEvent {
    pub user_id: String,
    pub event_type: String,
    pub title: String,
    pub message: String,
    pub source: String,
    #[serde(default)]
    pub channel: Channel,
    #[serde(default)]
    pub priority_hint: Option<PriorityHint>,
    #[serde(default)]
    pub dedupe_key: Option<String>,
    #[serde(default)]
    pub expires_at: Option<Timestamp>,
    #[serde(default)]
    pub timestamp: Option<Timestamp>,
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl NotificationEvent {
    /// Ingress validation of field length bounds.
    ///
    /// Expiry is deliberately not rejected here: an already-expired event is
    /// a valid submission that the pipeline suppresses at the L0 stage, so
    /// the suppression is auditable like any other terminal outcome.
    pub fn validate(&self) -> Result<(), CoreError> {
        bounded("user_id", &self.user_id, 1, MAX_USER_ID_LEN)?;
        bounded("event_type", &self.event_type, 1, MAX_EVENT_TYPE_LEN)?;
        bounded("title", &self.title, 1, MAX_TITLE_LEN)?;
        bounded("source", &self.source, 1, MAX_SOURCE_LEN)?;
        if self.message.is_empty() {
            return Err(CoreError::Validation("message must not be empty".into()));
        }
        if let Some(key) = &self.dedupe_key {
            bounded("dedupe_key", key, 1, MAX_DEDUPE_KEY_LEN)?;
        }
        Ok(())
    }

    /// Whether the producer flagged this event as critical.
    pub fn is_critical(&self) -> bool {
        self.priority_hint == Some(PriorityHint::Critical)
    }

    /// Whether the event carries an `expires_at` in the past.
    pub fn is_expired(&self, now: Timestamp) -> bool {
        self.expires_at.is_some_and(|exp| exp < now)
    }
}

fn bounded(field: &str, value: &str, min: usize, max: usize) -> Result<(), CoreError> {
    let len = value.chars().count();
    if len < min || len > max {
        return Err(CoreError::Validation(format!(
            "{field} length must be between {min} and {max} characters (got {len})"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn event() -> NotificationEvent {
        NotificationEvent {
            user_id: "user_123".into(),
            event_type: "payment_failed".into(),
            title: "Payment Failed".into(),
            message: "Your payment of $49.99 could not be processed.".into(),
            source: "billing-service".into(),
            channel: Channel::Push,
            priority_hint: Some(PriorityHint::Critical),
            dedupe_key: None,
            expires_at: None,
            timestamp: None,
            metadata: serde_json::Map::new(),
        }
    }

    #[test]
    fn valid_event_passes() {
        assert!(event().validate().is_ok());
    }

    #[test]
    fn empty_user_id_rejected() {
        let mut e = event();
        e.user_id = String::new();
        assert!(e.validate().is_err());
    }

    #[test]
    fn overlong_title_rejected() {
        let mut e = event();
        e.title = "x".repeat(257);
        assert!(e.validate().is_err());
    }

    #[test]
    fn empty_message_rejected() {
        let mut e = event();
        e.message = String::new();
        assert!(e.validate().is_err());
    }

    #[test]
    fn past_expiry_is_not_a_validation_error() {
        let mut e = event();
        e.expires_at = Some(Utc::now() - chrono::Duration::hours(1));
        assert!(e.validate().is_ok());
        assert!(e.is_expired(Utc::now()));
    }

    #[test]
    fn critical_flag_from_hint() {
        assert!(event().is_critical());
        let mut e = event();
        e.priority_hint = Some(PriorityHint::Low);
        assert!(!e.is_critical());
        e.priority_hint = None;
        assert!(!e.is_critical());
    }

    #[test]
    fn minimal_json_deserializes_with_defaults() {
        let e: NotificationEvent = serde_json::from_str(
            r#"{
                "user_id": "u1",
                "event_type": "promo_offer",
                "title": "Sale",
                "message": "20% off everything",
                "source": "marketing"
            }"#,
        )
        .unwrap();
        assert_eq!(e.channel, Channel::Push);
        assert!(e.priority_hint.is_none());
        assert!(e.metadata.is_empty());
    }
}
