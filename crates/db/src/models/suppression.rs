//! Durable suppression record model.
//!
//! Reserved for operator-managed long-lived suppressions; not consulted on
//! the decision hot path.

use serde::Serialize;
use sqlx::FromRow;
use triage_core::types::Timestamp;
use uuid::Uuid;

/// A row from the `suppression_records` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct SuppressionRecord {
    pub id: Uuid,
    pub user_id: String,
    pub fingerprint: String,
    pub reason: String,
    pub suppressed_until: Timestamp,
    pub created_at: Timestamp,
}
