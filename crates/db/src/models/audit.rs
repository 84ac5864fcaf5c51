//! Audit log model.

use serde::Serialize;
use sqlx::FromRow;
use triage_core::types::Timestamp;
use uuid::Uuid;

/// A row from the append-only `audit_log` table: the flattened decision,
/// reason chain, and raw input for one terminal outcome.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct AuditEntry {
    pub id: Uuid,
    pub event_id: Uuid,
    pub user_id: String,
    pub event_type: String,
    pub decision: String,
    pub score: Option<f64>,
    pub ai_used: bool,
    pub fallback_used: bool,
    pub rule_matched: Option<String>,
    pub reason_chain: serde_json::Value,
    pub raw_event: serde_json::Value,
    pub created_at: Timestamp,
}
