//! Repository for the `digest_batches` table.

use sqlx::PgExecutor;
use triage_core::types::Timestamp;
use uuid::Uuid;

use crate::models::digest::{DigestBatch, STATUS_CANCELLED, STATUS_PENDING, STATUS_SENT};

/// Column list for `digest_batches` queries.
const COLUMNS: &str = "id, user_id, channel, event_ids, scheduled_at, sent_at, status, created_at";

/// Provides access to digest batches.
pub struct DigestRepo;

impl DigestRepo {
    /// The open batch for `(user_id, channel)` scheduled inside
    /// `[from, from + window]`, if one exists.
    pub async fn find_pending<'e, E>(
        executor: E,
        user_id: &str,
        channel: &str,
        from: Timestamp,
        window: chrono::Duration,
    ) -> Result<Option<DigestBatch>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, DigestBatch>(&format!(
            "SELECT {COLUMNS} FROM digest_batches \
             WHERE user_id = $1 AND channel = $2 AND status = $3 \
               AND scheduled_at >= $4 AND scheduled_at <= $5 \
             ORDER BY scheduled_at \
             LIMIT 1"
        ))
        .bind(user_id)
        .bind(channel)
        .bind(STATUS_PENDING)
        .bind(from)
        .bind(from + window)
        .fetch_optional(executor)
        .await
    }

    /// Insert a new pending batch.
    pub async fn create<'e, E>(executor: E, batch: &DigestBatch) -> Result<(), sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query(
            "INSERT INTO digest_batches \
             (id, user_id, channel, event_ids, scheduled_at, sent_at, status, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(batch.id)
        .bind(&batch.user_id)
        .bind(&batch.channel)
        .bind(&batch.event_ids)
        .bind(batch.scheduled_at)
        .bind(batch.sent_at)
        .bind(&batch.status)
        .bind(batch.created_at)
        .execute(executor)
        .await?;
        Ok(())
    }

    /// Replace a batch's ordered event-id list.
    pub async fn set_event_ids<'e, E>(
        executor: E,
        id: Uuid,
        event_ids: &serde_json::Value,
    ) -> Result<(), sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query("UPDATE digest_batches SET event_ids = $2 WHERE id = $1")
            .bind(id)
            .bind(event_ids)
            .execute(executor)
            .await?;
        Ok(())
    }

    /// Pending batches whose `scheduled_at` has passed, oldest first.
    pub async fn list_due<'e, E>(
        executor: E,
        now: Timestamp,
        limit: i64,
    ) -> Result<Vec<DigestBatch>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, DigestBatch>(&format!(
            "SELECT {COLUMNS} FROM digest_batches \
             WHERE status = $1 AND scheduled_at <= $2 \
             ORDER BY scheduled_at \
             LIMIT $3"
        ))
        .bind(STATUS_PENDING)
        .bind(now)
        .bind(limit)
        .fetch_all(executor)
        .await
    }

    pub async fn mark_sent<'e, E>(executor: E, id: Uuid, now: Timestamp) -> Result<(), sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        Self::set_status(executor, id, STATUS_SENT, now).await
    }

    pub async fn mark_cancelled<'e, E>(
        executor: E,
        id: Uuid,
        now: Timestamp,
    ) -> Result<(), sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        Self::set_status(executor, id, STATUS_CANCELLED, now).await
    }

    async fn set_status<'e, E>(
        executor: E,
        id: Uuid,
        status: &str,
        now: Timestamp,
    ) -> Result<(), sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query("UPDATE digest_batches SET status = $2, sent_at = $3 WHERE id = $1")
            .bind(id)
            .bind(status)
            .bind(now)
            .execute(executor)
            .await?;
        Ok(())
    }
}
