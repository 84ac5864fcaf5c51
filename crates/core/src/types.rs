//! Shared enums and record types used across the pipeline.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

// ---------------------------------------------------------------------------
// Channel
// ---------------------------------------------------------------------------

/// Delivery channel for a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    Push,
    Email,
    Sms,
    InApp,
}

impl Channel {
    /// Column / wire value for this channel.
    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Push => "push",
            Channel::Email => "email",
            Channel::Sms => "sms",
            Channel::InApp => "in_app",
        }
    }
}

impl Default for Channel {
    fn default() -> Self {
        Channel::Push
    }
}

// ---------------------------------------------------------------------------
// Priority hint
// ---------------------------------------------------------------------------

/// Producer-supplied priority hint. `Critical` events bypass cooldowns,
/// DND windows, and fatigue caps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriorityHint {
    Critical,
    High,
    Medium,
    Low,
}

impl PriorityHint {
    pub fn as_str(&self) -> &'static str {
        match self {
            PriorityHint::Critical => "critical",
            PriorityHint::High => "high",
            PriorityHint::Medium => "medium",
            PriorityHint::Low => "low",
        }
    }
}

// ---------------------------------------------------------------------------
// Decision
// ---------------------------------------------------------------------------

/// Terminal outcome of the evaluation pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Now,
    Later,
    Never,
}

impl Decision {
    pub fn as_str(&self) -> &'static str {
        match self {
            Decision::Now => "now",
            Decision::Later => "later",
            Decision::Never => "never",
        }
    }
}

// ---------------------------------------------------------------------------
// Reason chain
// ---------------------------------------------------------------------------

/// Pipeline layer labels used in reason steps and audit rows.
pub mod layers {
    pub const INGESTION: &str = "L0-Ingestion";
    pub const ERROR: &str = "L0-Error";
    pub const DEDUP: &str = "L1-Dedup";
    pub const RULES: &str = "L2-Rules";
    pub const SCORER: &str = "L4-AIScorer";
    pub const ARBITER: &str = "L5-Arbiter";
}

/// One entry of the audit-grade explanation chain.
///
/// Every pipeline stage appends at least one step, including PASS results,
/// so the audit log always shows what was checked.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReasonStep {
    pub layer: String,
    pub check: String,
    pub result: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl ReasonStep {
    pub fn new(
        layer: impl Into<String>,
        check: impl Into<String>,
        result: impl Into<String>,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            layer: layer.into(),
            check: check.into(),
            result: result.into(),
            detail: Some(detail.into()),
        }
    }
}

// ---------------------------------------------------------------------------
// Decision result
// ---------------------------------------------------------------------------

/// The fully explained outcome of evaluating one notification event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionResult {
    pub event_id: Uuid,
    pub user_id: String,
    pub decision: Decision,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheduled_at: Option<Timestamp>,
    pub reason_chain: Vec<ReasonStep>,
    pub ai_used: bool,
    pub fallback_used: bool,
    pub processed_at: Timestamp,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_round_trips_through_serde() {
        let json = serde_json::to_string(&Channel::InApp).unwrap();
        assert_eq!(json, "\"in_app\"");
        let back: Channel = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Channel::InApp);
    }

    #[test]
    fn default_channel_is_push() {
        assert_eq!(Channel::default(), Channel::Push);
    }

    #[test]
    fn decision_as_str_matches_wire_values() {
        assert_eq!(Decision::Now.as_str(), "now");
        assert_eq!(Decision::Later.as_str(), "later");
        assert_eq!(Decision::Never.as_str(), "never");
    }

    #[test]
    fn reason_step_serializes_detail_when_present() {
        let step = ReasonStep::new(layers::DEDUP, "exact_duplicate", "PASS", "no duplicate");
        let json = serde_json::to_value(&step).unwrap();
        assert_eq!(json["layer"], "L1-Dedup");
        assert_eq!(json["detail"], "no duplicate");
    }
}
