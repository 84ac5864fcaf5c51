//! Rule condition DSL.
//!
//! A condition maps a field name to a matcher. Field names address the
//! event's own fields (`event_type`, `source`, `channel`, `priority_hint`,
//! `user_id`) or metadata entries via dotted `meta.<key>` lookups. Matchers
//! come in three shapes:
//!
//! - a list: the field must be one of the listed values;
//! - a scalar: the field must equal it;
//! - an operator map: every operator must pass (`gte`, `lte`, `contains`,
//!   `not_in`; unknown operators are ignored).
//!
//! All entries of a condition are AND-combined. A missing field never
//! matches, except under `not_in` where a missing field passes.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::event::NotificationEvent;

/// A single field matcher. Untagged: JSON arrays become `OneOf`, objects
/// become `Ops`, and everything else is an exact-equality scalar.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Matcher {
    OneOf(Vec<Value>),
    Ops(BTreeMap<String, Value>),
    Equals(Value),
}

/// An AND-combined set of field matchers.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Conditions(pub BTreeMap<String, Matcher>);

impl Conditions {
    /// Evaluate every matcher against the event. An empty condition set
    /// matches everything.
    pub fn matches(&self, event: &NotificationEvent) -> bool {
        self.0
            .iter()
            .all(|(field, matcher)| matcher_passes(matcher, field_value(event, field).as_ref()))
    }
}

/// Resolve a condition field name to the event's value, if present.
fn field_value(event: &NotificationEvent, field: &str) -> Option<Value> {
    match field {
        "event_type" => Some(Value::String(event.event_type.clone())),
        "source" => Some(Value::String(event.source.clone())),
        "channel" => Some(Value::String(event.channel.as_str().to_string())),
        "priority_hint" => event
            .priority_hint
            .map(|hint| Value::String(hint.as_str().to_string())),
        "user_id" => Some(Value::String(event.user_id.clone())),
        _ => field
            .strip_prefix("meta.")
            .and_then(|key| event.metadata.get(key).cloned()),
    }
}

fn matcher_passes(matcher: &Matcher, value: Option<&Value>) -> bool {
    match matcher {
        Matcher::OneOf(options) => value.is_some_and(|v| options.contains(v)),
        Matcher::Equals(expected) => value == Some(expected),
        Matcher::Ops(ops) => ops.iter().all(|(op, operand)| match op.as_str() {
            "gte" => compare(value, operand).is_some_and(|ord| ord.is_ge()),
            "lte" => compare(value, operand).is_some_and(|ord| ord.is_le()),
            "contains" => contains(value, operand),
            "not_in" => match operand {
                Value::Array(options) => !value.is_some_and(|v| options.contains(v)),
                _ => true,
            },
            // Unknown operators are ignored, matching the permissive
            // semantics of list/scalar matchers on unexpected input.
            _ => true,
        }),
    }
}

/// Order two JSON values: numerically when both are numbers, lexically when
/// both are strings, otherwise incomparable (the operator fails).
fn compare(value: Option<&Value>, operand: &Value) -> Option<std::cmp::Ordering> {
    let value = value?;
    match (value.as_f64(), operand.as_f64()) {
        (Some(a), Some(b)) => a.partial_cmp(&b),
        _ => match (value.as_str(), operand.as_str()) {
            (Some(a), Some(b)) => Some(a.cmp(b)),
            _ => None,
        },
    }
}

/// Case-insensitive substring check over the stringified field value.
fn contains(value: Option<&Value>, operand: &Value) -> bool {
    let Some(value) = value else {
        return false;
    };
    let Some(needle) = operand.as_str() else {
        return false;
    };
    let haystack = match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Channel, PriorityHint};
    use serde_json::json;

    fn event() -> NotificationEvent {
        let mut metadata = serde_json::Map::new();
        metadata.insert("amount".into(), json!(49.99));
        metadata.insert("plan".into(), json!("Premium Plus"));
        NotificationEvent {
            user_id: "user_1".into(),
            event_type: "payment_failed".into(),
            title: "Payment failed".into(),
            message: "Please retry".into(),
            source: "billing".into(),
            channel: Channel::Sms,
            priority_hint: Some(PriorityHint::High),
            dedupe_key: None,
            expires_at: None,
            timestamp: None,
            metadata,
        }
    }

    fn conditions(json: Value) -> Conditions {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn empty_conditions_match_everything() {
        assert!(conditions(json!({})).matches(&event()));
    }

    #[test]
    fn list_matcher_checks_membership() {
        let c = conditions(json!({"event_type": ["payment_failed", "payment_declined"]}));
        assert!(c.matches(&event()));
        let c = conditions(json!({"event_type": ["promo_offer"]}));
        assert!(!c.matches(&event()));
    }

    #[test]
    fn scalar_matcher_checks_equality() {
        assert!(conditions(json!({"channel": "sms"})).matches(&event()));
        assert!(!conditions(json!({"channel": "push"})).matches(&event()));
    }

    #[test]
    fn conditions_are_and_combined() {
        let c = conditions(json!({"channel": "sms", "source": "billing"}));
        assert!(c.matches(&event()));
        let c = conditions(json!({"channel": "sms", "source": "marketing"}));
        assert!(!c.matches(&event()));
    }

    #[test]
    fn missing_field_never_matches() {
        let c = conditions(json!({"meta.unknown": "x"}));
        assert!(!c.matches(&event()));
    }

    #[test]
    fn missing_priority_hint_never_matches() {
        let mut e = event();
        e.priority_hint = None;
        assert!(!conditions(json!({"priority_hint": "high"})).matches(&e));
    }

    #[test]
    fn meta_lookup_uses_dotted_keys() {
        assert!(conditions(json!({"meta.plan": "Premium Plus"})).matches(&event()));
    }

    #[test]
    fn gte_and_lte_compare_numbers() {
        assert!(conditions(json!({"meta.amount": {"gte": 49}})).matches(&event()));
        assert!(conditions(json!({"meta.amount": {"lte": 50}})).matches(&event()));
        assert!(!conditions(json!({"meta.amount": {"gte": 100}})).matches(&event()));
    }

    #[test]
    fn gte_on_missing_field_fails() {
        assert!(!conditions(json!({"meta.count": {"gte": 1}})).matches(&event()));
    }

    #[test]
    fn contains_is_case_insensitive() {
        assert!(conditions(json!({"event_type": {"contains": "FAIL"}})).matches(&event()));
        assert!(conditions(json!({"meta.plan": {"contains": "premium"}})).matches(&event()));
        assert!(!conditions(json!({"event_type": {"contains": "promo"}})).matches(&event()));
    }

    #[test]
    fn not_in_passes_on_missing_field() {
        let c = conditions(json!({"meta.region": {"not_in": ["eu", "us"]}}));
        assert!(c.matches(&event()));
    }

    #[test]
    fn not_in_fails_on_listed_value() {
        let c = conditions(json!({"channel": {"not_in": ["sms"]}}));
        assert!(!c.matches(&event()));
        let c = conditions(json!({"channel": {"not_in": ["push", "email"]}}));
        assert!(c.matches(&event()));
    }

    #[test]
    fn operator_map_requires_all_operators() {
        let c = conditions(json!({"meta.amount": {"gte": 10, "lte": 20}}));
        assert!(!c.matches(&event()));
    }

    #[test]
    fn unknown_operator_is_ignored() {
        let c = conditions(json!({"event_type": {"startswith": "pay"}}));
        assert!(c.matches(&event()));
    }
}
