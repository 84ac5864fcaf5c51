//! Rule configuration models and DTOs.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use triage_core::error::CoreError;
use triage_core::rules::{MAX_PRIORITY_ORDER, MIN_PRIORITY_ORDER, VALID_RULE_TYPES};
use triage_core::types::Timestamp;
use uuid::Uuid;

/// A row from the `rule_configs` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Rule {
    pub id: Uuid,
    pub rule_name: String,
    pub rule_type: String,
    pub conditions: serde_json::Value,
    pub action_params: serde_json::Value,
    pub priority_order: i32,
    pub is_active: bool,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// DTO for creating or replacing a rule.
#[derive(Debug, Clone, Deserialize)]
pub struct RuleInput {
    pub rule_name: String,
    pub rule_type: String,
    pub conditions: serde_json::Value,
    #[serde(default = "default_action_params")]
    pub action_params: serde_json::Value,
    #[serde(default = "default_priority_order")]
    pub priority_order: i32,
    #[serde(default = "default_is_active")]
    pub is_active: bool,
}

fn default_action_params() -> serde_json::Value {
    serde_json::Value::Object(Default::default())
}

fn default_priority_order() -> i32 {
    100
}

fn default_is_active() -> bool {
    true
}

impl RuleInput {
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.rule_name.is_empty() || self.rule_name.len() > 128 {
            return Err(CoreError::Validation(
                "rule_name length must be between 1 and 128 characters".into(),
            ));
        }
        if !VALID_RULE_TYPES.contains(&self.rule_type.as_str()) {
            return Err(CoreError::Validation(format!(
                "rule_type must be one of {VALID_RULE_TYPES:?}"
            )));
        }
        if !self.conditions.is_object() {
            return Err(CoreError::Validation("conditions must be an object".into()));
        }
        if self.priority_order < MIN_PRIORITY_ORDER || self.priority_order > MAX_PRIORITY_ORDER {
            return Err(CoreError::Validation(format!(
                "priority_order must be between {MIN_PRIORITY_ORDER} and {MAX_PRIORITY_ORDER}"
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn input() -> RuleInput {
        serde_json::from_value(json!({
            "rule_name": "Force critical payment alerts",
            "rule_type": "force_now",
            "conditions": {"event_type": ["payment_failed"]}
        }))
        .unwrap()
    }

    #[test]
    fn defaults_applied_on_deserialize() {
        let rule = input();
        assert_eq!(rule.priority_order, 100);
        assert!(rule.is_active);
        assert!(rule.action_params.is_object());
    }

    #[test]
    fn valid_input_passes() {
        assert!(input().validate().is_ok());
    }

    #[test]
    fn unknown_rule_type_rejected() {
        let mut rule = input();
        rule.rule_type = "force_maybe".into();
        assert!(rule.validate().is_err());
    }

    #[test]
    fn priority_order_bounds_enforced() {
        let mut rule = input();
        rule.priority_order = 0;
        assert!(rule.validate().is_err());
        rule.priority_order = 1001;
        assert!(rule.validate().is_err());
        rule.priority_order = 1000;
        assert!(rule.validate().is_ok());
    }

    #[test]
    fn non_object_conditions_rejected() {
        let mut rule = input();
        rule.conditions = json!(["not", "an", "object"]);
        assert!(rule.validate().is_err());
    }
}
