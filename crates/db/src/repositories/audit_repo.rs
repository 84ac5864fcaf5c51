//! Repository for the append-only `audit_log` table.

use sqlx::{PgExecutor, PgPool};
use uuid::Uuid;

use crate::models::audit::AuditEntry;

/// Column list for `audit_log` queries.
const COLUMNS: &str = "id, event_id, user_id, event_type, decision, score, ai_used, \
     fallback_used, rule_matched, reason_chain, raw_event, created_at";

/// Provides access to audit entries.
pub struct AuditRepo;

impl AuditRepo {
    /// Append one audit row. Generic over the executor so the dispatcher can
    /// write it in the same transaction as the event row.
    pub async fn insert<'e, E>(executor: E, entry: &AuditEntry) -> Result<(), sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query(
            "INSERT INTO audit_log \
             (id, event_id, user_id, event_type, decision, score, ai_used, fallback_used, \
              rule_matched, reason_chain, raw_event, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)",
        )
        .bind(entry.id)
        .bind(entry.event_id)
        .bind(&entry.user_id)
        .bind(&entry.event_type)
        .bind(&entry.decision)
        .bind(entry.score)
        .bind(entry.ai_used)
        .bind(entry.fallback_used)
        .bind(&entry.rule_matched)
        .bind(&entry.reason_chain)
        .bind(&entry.raw_event)
        .bind(entry.created_at)
        .execute(executor)
        .await?;
        Ok(())
    }

    /// The audit entry for one event id, if present.
    pub async fn get_by_event_id(
        pool: &PgPool,
        event_id: Uuid,
    ) -> Result<Option<AuditEntry>, sqlx::Error> {
        sqlx::query_as::<_, AuditEntry>(&format!(
            "SELECT {COLUMNS} FROM audit_log WHERE event_id = $1 LIMIT 1"
        ))
        .bind(event_id)
        .fetch_optional(pool)
        .await
    }
}
