//! Event identity fingerprinting for exact-duplicate detection.

use crate::event::NotificationEvent;
use crate::hashing::sha256_hex;

/// Lowercase, strip punctuation, collapse whitespace.
///
/// Word characters (alphanumerics and `_`) survive so that titles differing
/// only in punctuation or casing produce the same normalized form.
pub fn normalize_text(text: &str) -> String {
    let lowered = text.to_lowercase();
    let stripped: String = lowered
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace() || *c == '_')
        .collect();
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// SHA-256 of the canonical event identity:
/// `user_id | event_type | (dedupe_key or normalized title) | source`.
///
/// Deterministic, and stable under title variations whenever a `dedupe_key`
/// is supplied.
pub fn compute_fingerprint(event: &NotificationEvent) -> String {
    let identity = event
        .dedupe_key
        .clone()
        .unwrap_or_else(|| normalize_text(&event.title));
    let raw = format!(
        "{}|{}|{}|{}",
        event.user_id, event.event_type, identity, event.source
    );
    sha256_hex(raw.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Channel;

    fn event(user_id: &str, title: &str, dedupe_key: Option<&str>) -> NotificationEvent {
        NotificationEvent {
            user_id: user_id.into(),
            event_type: "payment_failed".into(),
            title: title.into(),
            message: "body".into(),
            source: "billing".into(),
            channel: Channel::Push,
            priority_hint: None,
            dedupe_key: dedupe_key.map(Into::into),
            expires_at: None,
            timestamp: None,
            metadata: serde_json::Map::new(),
        }
    }

    #[test]
    fn normalization_strips_punctuation_and_case() {
        assert_eq!(
            normalize_text("  Payment FAILED!!  Please,   retry. "),
            "payment failed please retry"
        );
    }

    #[test]
    fn fingerprint_is_deterministic() {
        let e = event("u1", "Payment failed", None);
        assert_eq!(compute_fingerprint(&e), compute_fingerprint(&e));
        assert_eq!(compute_fingerprint(&e).len(), 64);
    }

    #[test]
    fn different_users_get_different_fingerprints() {
        let a = event("u1", "Payment failed", None);
        let b = event("u2", "Payment failed", None);
        assert_ne!(compute_fingerprint(&a), compute_fingerprint(&b));
    }

    #[test]
    fn dedupe_key_makes_fingerprint_stable_across_titles() {
        let a = event("u1", "Payment failed", Some("pay-42"));
        let b = event("u1", "Your payment has failed", Some("pay-42"));
        assert_eq!(compute_fingerprint(&a), compute_fingerprint(&b));
    }

    #[test]
    fn title_punctuation_does_not_change_fingerprint() {
        let a = event("u1", "Payment failed.", None);
        let b = event("u1", "payment FAILED", None);
        assert_eq!(compute_fingerprint(&a), compute_fingerprint(&b));
    }

    #[test]
    fn different_titles_without_key_differ() {
        let a = event("u1", "Payment failed", None);
        let b = event("u1", "Card expired", None);
        assert_ne!(compute_fingerprint(&a), compute_fingerprint(&b));
    }
}
