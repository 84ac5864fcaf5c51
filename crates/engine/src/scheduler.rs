//! Digest scheduler.
//!
//! A long-lived background task that polls for due digest batches and moves
//! them to the send-now topic: single surviving events go out as scheduled
//! sends, multiple events as one digest message. Expired events are dropped
//! at maturation time; a batch left empty is cancelled. Per-batch errors
//! are logged and never abort the tick.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use sqlx::PgPool;
use tokio_util::sync::CancellationToken;
use triage_bus::{topics, MessageBus};
use triage_core::types::Timestamp;
use triage_db::models::digest::DigestBatch;
use triage_db::models::event::StoredEvent;
use triage_db::repositories::{DigestRepo, EventRepo};

use crate::config::EngineConfig;
use crate::error::EngineError;

/// Batch rows picked up per tick.
const BATCH_LIMIT: i64 = 100;

/// Background service that matures deferred digest batches.
pub struct DigestScheduler {
    pool: PgPool,
    bus: Arc<dyn MessageBus>,
    config: Arc<EngineConfig>,
}

impl DigestScheduler {
    pub fn new(pool: PgPool, bus: Arc<dyn MessageBus>, config: Arc<EngineConfig>) -> Self {
        Self { pool, bus, config }
    }

    /// Run the scheduler loop until the token is cancelled.
    pub async fn run(&self, cancel: CancellationToken) {
        let poll_interval = Duration::from_secs(self.config.scheduler_poll_interval_seconds);
        tracing::info!(
            poll_interval_secs = poll_interval.as_secs(),
            "Digest scheduler started"
        );
        let mut interval = tokio::time::interval(poll_interval);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Digest scheduler cancelled");
                    break;
                }
                _ = interval.tick() => {
                    if let Err(e) = self.process_due_batches().await {
                        tracing::error!(error = %e, "Digest tick failed");
                    }
                }
            }
        }
    }

    /// One tick: collect due batches, publish each, commit once.
    pub async fn process_due_batches(&self) -> Result<(), EngineError> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let batches = DigestRepo::list_due(&mut *tx, now, BATCH_LIMIT).await?;
        if batches.is_empty() {
            tx.commit().await?;
            return Ok(());
        }

        tracing::info!(count = batches.len(), "Processing due digest batches");

        for batch in &batches {
            if let Err(e) = self.mature_batch(&mut tx, batch, now).await {
                tracing::error!(batch_id = %batch.id, error = %e, "Digest batch failed");
            }
        }

        tx.commit().await?;
        Ok(())
    }

    /// Publish one due batch and mark it sent (or cancelled when every
    /// event has expired).
    async fn mature_batch(
        &self,
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        batch: &DigestBatch,
        now: Timestamp,
    ) -> Result<(), EngineError> {
        let ids = batch.event_id_list();
        let events = EventRepo::list_by_ids(&mut **tx, &ids).await?;
        let valid = drop_expired(events, now);

        if valid.is_empty() {
            tracing::info!(batch_id = %batch.id, "All batch events expired, cancelling");
            DigestRepo::mark_cancelled(&mut **tx, batch.id, now).await?;
            return Ok(());
        }

        let payload = if valid.len() == 1 {
            single_event_payload(&valid[0], now)
        } else {
            digest_payload(batch, &valid, now)
        };

        if let Err(e) = self
            .bus
            .publish(topics::SEND_NOW, &batch.user_id, payload)
            .await
        {
            tracing::warn!(batch_id = %batch.id, error = %e, "Digest publish failed");
        }

        DigestRepo::mark_sent(&mut **tx, batch.id, now).await?;
        tracing::info!(
            batch_id = %batch.id,
            user_id = %batch.user_id,
            event_count = valid.len(),
            "Digest batch sent"
        );
        Ok(())
    }
}

/// Retain only events that have not expired by `now`.
fn drop_expired(events: Vec<StoredEvent>, now: Timestamp) -> Vec<StoredEvent> {
    events.into_iter().filter(|e| !e.is_expired(now)).collect()
}

/// A matured single-event send.
fn single_event_payload(event: &StoredEvent, now: Timestamp) -> serde_json::Value {
    serde_json::json!({
        "event_id": event.id,
        "user_id": event.user_id,
        "event_type": event.event_type,
        "title": event.title,
        "message": event.message,
        "channel": event.channel,
        "source": event.source,
        "metadata": event.metadata,
        "dispatched_at": now.to_rfc3339(),
        "scheduled_send": true,
    })
}

/// A multi-event digest, items ascending by `metadata.priority_order`.
fn digest_payload(batch: &DigestBatch, events: &[StoredEvent], now: Timestamp) -> serde_json::Value {
    let mut ordered: Vec<&StoredEvent> = events.iter().collect();
    ordered.sort_by_key(|e| e.digest_priority_order());

    let items: Vec<serde_json::Value> = ordered
        .iter()
        .map(|e| {
            serde_json::json!({
                "event_id": e.id,
                "event_type": e.event_type,
                "title": e.title,
                "message": e.message,
                "source": e.source,
            })
        })
        .collect();

    serde_json::json!({
        "batch_id": batch.id,
        "user_id": batch.user_id,
        "channel": batch.channel,
        "type": "digest",
        "items": items,
        "item_count": items.len(),
        "dispatched_at": now.to_rfc3339(),
    })
}
