//! Repository for the `notification_events` table.

use sqlx::{PgExecutor, PgPool};
use uuid::Uuid;

use crate::models::event::StoredEvent;

/// Column list for `notification_events` queries.
const COLUMNS: &str = "id, user_id, event_type, title, message, source, channel, priority_hint, \
     dedupe_key, computed_fingerprint, expires_at, event_timestamp, metadata, decision, score, \
     scheduled_at, decision_reason, ai_used, fallback_used, rule_matched, created_at, processed_at";

/// Provides access to stored notification events.
pub struct EventRepo;

impl EventRepo {
    /// Insert a fully decided event row. Generic over the executor so the
    /// dispatcher can write it inside the same transaction as the audit row.
    pub async fn insert<'e, E>(executor: E, event: &StoredEvent) -> Result<(), sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query(
            "INSERT INTO notification_events \
             (id, user_id, event_type, title, message, source, channel, priority_hint, \
              dedupe_key, computed_fingerprint, expires_at, event_timestamp, metadata, decision, \
              score, scheduled_at, decision_reason, ai_used, fallback_used, rule_matched, \
              created_at, processed_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, \
              $17, $18, $19, $20, $21, $22)",
        )
        .bind(event.id)
        .bind(&event.user_id)
        .bind(&event.event_type)
        .bind(&event.title)
        .bind(&event.message)
        .bind(&event.source)
        .bind(&event.channel)
        .bind(&event.priority_hint)
        .bind(&event.dedupe_key)
        .bind(&event.computed_fingerprint)
        .bind(event.expires_at)
        .bind(event.event_timestamp)
        .bind(&event.metadata)
        .bind(&event.decision)
        .bind(event.score)
        .bind(event.scheduled_at)
        .bind(&event.decision_reason)
        .bind(event.ai_used)
        .bind(event.fallback_used)
        .bind(&event.rule_matched)
        .bind(event.created_at)
        .bind(event.processed_at)
        .execute(executor)
        .await?;
        Ok(())
    }

    /// Fetch a single event by id.
    pub async fn get_by_id(pool: &PgPool, id: Uuid) -> Result<Option<StoredEvent>, sqlx::Error> {
        sqlx::query_as::<_, StoredEvent>(&format!(
            "SELECT {COLUMNS} FROM notification_events WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    /// Recent events for a user, newest first.
    pub async fn list_for_user(
        pool: &PgPool,
        user_id: &str,
        limit: i64,
    ) -> Result<Vec<StoredEvent>, sqlx::Error> {
        sqlx::query_as::<_, StoredEvent>(&format!(
            "SELECT {COLUMNS} FROM notification_events \
             WHERE user_id = $1 \
             ORDER BY created_at DESC \
             LIMIT $2"
        ))
        .bind(user_id)
        .bind(limit)
        .fetch_all(pool)
        .await
    }

    /// Fetch a set of events by id (order unspecified).
    pub async fn list_by_ids<'e, E>(executor: E, ids: &[Uuid]) -> Result<Vec<StoredEvent>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, StoredEvent>(&format!(
            "SELECT {COLUMNS} FROM notification_events WHERE id = ANY($1)"
        ))
        .bind(ids)
        .fetch_all(executor)
        .await
    }
}
