//! Digest batch model.

use serde::Serialize;
use sqlx::FromRow;
use triage_core::types::Timestamp;
use uuid::Uuid;

/// Batch lifecycle states.
pub const STATUS_PENDING: &str = "pending";
pub const STATUS_SENT: &str = "sent";
pub const STATUS_CANCELLED: &str = "cancelled";

/// A row from the `digest_batches` table: deferred events for one
/// `(user_id, channel)` aggregated for delivery at `scheduled_at`.
///
/// Invariant: at most one `pending` batch per `(user_id, channel)` within
/// the aggregation window.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct DigestBatch {
    pub id: Uuid,
    pub user_id: String,
    pub channel: String,
    pub event_ids: serde_json::Value,
    pub scheduled_at: Timestamp,
    pub sent_at: Option<Timestamp>,
    pub status: String,
    pub created_at: Timestamp,
}

impl DigestBatch {
    /// Ordered event ids (tolerates malformed JSON).
    pub fn event_id_list(&self) -> Vec<Uuid> {
        serde_json::from_value(self.event_ids.clone()).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;

    #[test]
    fn event_id_list_parses_in_order() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let batch = DigestBatch {
            id: Uuid::new_v4(),
            user_id: "u1".into(),
            channel: "push".into(),
            event_ids: json!([a, b]),
            scheduled_at: Utc::now(),
            sent_at: None,
            status: STATUS_PENDING.into(),
            created_at: Utc::now(),
        };
        assert_eq!(batch.event_id_list(), vec![a, b]);
    }
}
