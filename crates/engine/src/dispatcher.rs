//! Dispatcher — the final routing layer.
//!
//! - NOW: publish to the send-now topic, then bump fatigue counters and arm
//!   the per-topic cooldown.
//! - LATER: publish to the defer topic and attach the event to a digest
//!   batch for its `(user_id, channel)`.
//! - NEVER: no publish; the audit row is sufficient.
//!
//! Every decision writes a `notification_events` row and an `audit_log` row
//! in one transaction. Publish and counter failures are logged and never
//! abort the pipeline; the persisted rows are the source of truth.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use sqlx::PgPool;
use triage_bus::{topics, MessageBus};
use triage_core::event::NotificationEvent;
use triage_core::types::{Decision, DecisionResult, ReasonStep, Timestamp};
use triage_db::models::audit::AuditEntry;
use triage_db::models::digest::{DigestBatch, STATUS_PENDING};
use triage_db::models::event::StoredEvent;
use triage_db::repositories::{AuditRepo, DigestRepo, EventRepo};
use triage_kv::{keys, KvStore};
use uuid::Uuid;

use crate::config::EngineConfig;
use crate::error::EngineError;

/// Sliding-window TTLs for the fatigue counters.
const ONE_HOUR: Duration = Duration::from_secs(3600);
const ONE_DAY: Duration = Duration::from_secs(86_400);

/// Everything the dispatcher needs to route one decided event.
pub struct DispatchRequest<'a> {
    pub event_id: Uuid,
    pub event: &'a NotificationEvent,
    pub fingerprint: String,
    pub decision: Decision,
    pub score: Option<f64>,
    pub scheduled_at: Option<Timestamp>,
    pub reason_chain: Vec<ReasonStep>,
    pub ai_used: bool,
    pub fallback_used: bool,
    pub rule_matched: Option<String>,
}

/// Routes decisions to the bus and persists event, audit, and batch rows.
pub struct Dispatcher {
    kv: Arc<dyn KvStore>,
    bus: Arc<dyn MessageBus>,
    config: Arc<EngineConfig>,
}

impl Dispatcher {
    pub fn new(
        kv: Arc<dyn KvStore>,
        bus: Arc<dyn MessageBus>,
        config: Arc<EngineConfig>,
    ) -> Self {
        Self { kv, bus, config }
    }

    /// Persist and route one decision, returning the caller-facing result.
    pub async fn dispatch(
        &self,
        pool: &PgPool,
        request: DispatchRequest<'_>,
    ) -> Result<DecisionResult, EngineError> {
        let now = Utc::now();
        let event = request.event;

        let stored = StoredEvent {
            id: request.event_id,
            user_id: event.user_id.clone(),
            event_type: event.event_type.clone(),
            title: event.title.clone(),
            message: event.message.clone(),
            source: event.source.clone(),
            channel: event.channel.as_str().to_string(),
            priority_hint: event.priority_hint.map(|h| h.as_str().to_string()),
            dedupe_key: event.dedupe_key.clone(),
            computed_fingerprint: request.fingerprint.clone(),
            expires_at: event.expires_at,
            event_timestamp: event.timestamp.unwrap_or(now),
            metadata: serde_json::Value::Object(event.metadata.clone()),
            decision: Some(request.decision.as_str().to_string()),
            score: request.score,
            scheduled_at: request.scheduled_at,
            decision_reason: serde_json::to_value(&request.reason_chain)?,
            ai_used: request.ai_used,
            fallback_used: request.fallback_used,
            rule_matched: request.rule_matched.clone(),
            created_at: now,
            processed_at: Some(now),
        };

        let audit = AuditEntry {
            id: Uuid::new_v4(),
            event_id: request.event_id,
            user_id: event.user_id.clone(),
            event_type: event.event_type.clone(),
            decision: request.decision.as_str().to_string(),
            score: request.score,
            ai_used: request.ai_used,
            fallback_used: request.fallback_used,
            rule_matched: request.rule_matched.clone(),
            reason_chain: serde_json::to_value(&request.reason_chain)?,
            raw_event: serde_json::to_value(event)?,
            created_at: now,
        };

        // Event, audit, and batch assignment land in one transaction.
        let mut tx = pool.begin().await?;
        EventRepo::insert(&mut *tx, &stored).await?;
        AuditRepo::insert(&mut *tx, &audit).await?;
        if request.decision == Decision::Later {
            if let Some(scheduled_at) = request.scheduled_at {
                self.ensure_digest_batch(&mut tx, &request, scheduled_at, now)
                    .await?;
            }
        }
        tx.commit().await?;

        match request.decision {
            Decision::Now => {
                self.publish_send_now(&request, now).await;
                self.increment_fatigue_counters(&event.user_id, &event.event_type, now)
                    .await;
                self.register_cooldown(event).await;
                tracing::info!(
                    event_id = %request.event_id,
                    user_id = %event.user_id,
                    event_type = %event.event_type,
                    "Dispatched immediately"
                );
            }
            Decision::Later => {
                self.publish_defer(&request).await;
                tracing::info!(
                    event_id = %request.event_id,
                    scheduled_at = ?request.scheduled_at,
                    "Deferred"
                );
            }
            Decision::Never => {
                tracing::info!(
                    event_id = %request.event_id,
                    reason = request.rule_matched.as_deref().unwrap_or("score_below_threshold"),
                    "Suppressed"
                );
            }
        }

        Ok(DecisionResult {
            event_id: request.event_id,
            user_id: event.user_id.clone(),
            decision: request.decision,
            score: request.score,
            scheduled_at: request.scheduled_at,
            reason_chain: request.reason_chain,
            ai_used: request.ai_used,
            fallback_used: request.fallback_used,
            processed_at: now,
        })
    }

    /// Append the event to the open batch for `(user_id, channel)` whose
    /// schedule falls inside the aggregation window around this event's
    /// send time, or open a new one at the arbiter's time. At most one
    /// pending batch exists per `(user_id, channel)` per window.
    async fn ensure_digest_batch(
        &self,
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        request: &DispatchRequest<'_>,
        scheduled_at: Timestamp,
        now: Timestamp,
    ) -> Result<(), EngineError> {
        let window = chrono::Duration::minutes(self.config.digest_batch_window_minutes);
        let channel = request.event.channel.as_str();

        let existing = DigestRepo::find_pending(
            &mut **tx,
            &request.event.user_id,
            channel,
            scheduled_at,
            window,
        )
        .await?;

        match existing {
            Some(batch) => {
                let mut ids = batch.event_id_list();
                ids.push(request.event_id);
                DigestRepo::set_event_ids(&mut **tx, batch.id, &serde_json::to_value(ids)?).await?;
            }
            None => {
                let batch = DigestBatch {
                    id: Uuid::new_v4(),
                    user_id: request.event.user_id.clone(),
                    channel: channel.to_string(),
                    event_ids: serde_json::to_value(vec![request.event_id])?,
                    scheduled_at,
                    sent_at: None,
                    status: STATUS_PENDING.to_string(),
                    created_at: now,
                };
                DigestRepo::create(&mut **tx, &batch).await?;
            }
        }
        Ok(())
    }

    async fn publish_send_now(&self, request: &DispatchRequest<'_>, now: Timestamp) {
        let event = request.event;
        let payload = serde_json::json!({
            "event_id": request.event_id,
            "user_id": event.user_id,
            "event_type": event.event_type,
            "title": event.title,
            "message": event.message,
            "channel": event.channel.as_str(),
            "source": event.source,
            "metadata": event.metadata,
            "dispatched_at": now.to_rfc3339(),
        });
        if let Err(e) = self
            .bus
            .publish(topics::SEND_NOW, &event.user_id, payload)
            .await
        {
            tracing::warn!(error = %e, topic = topics::SEND_NOW, "Publish failed");
        }
    }

    async fn publish_defer(&self, request: &DispatchRequest<'_>) {
        let event = request.event;
        let payload = serde_json::json!({
            "event_id": request.event_id,
            "user_id": event.user_id,
            "scheduled_at": request.scheduled_at.map(|t| t.to_rfc3339()),
            "channel": event.channel.as_str(),
        });
        if let Err(e) = self.bus.publish(topics::DEFER, &event.user_id, payload).await {
            tracing::warn!(error = %e, topic = topics::DEFER, "Publish failed");
        }
    }

    /// Sliding-window counter bumps. The TTL is pinned by the first writer
    /// in each window (`expire_nx`), so concurrent bumps share one window.
    async fn increment_fatigue_counters(&self, user_id: &str, event_type: &str, now: Timestamp) {
        let k1h = keys::count_1h(user_id);
        let k24h = keys::count_24h(user_id);

        let result: Result<(), triage_kv::KvError> = async {
            self.kv.incr(&k1h).await?;
            self.kv.expire_nx(&k1h, ONE_HOUR).await?;
            self.kv.incr(&k24h).await?;
            self.kv.expire_nx(&k24h, ONE_DAY).await?;
            self.kv
                .set(
                    &keys::last_send(user_id, event_type),
                    &format!("{}", now.timestamp()),
                    ONE_DAY,
                )
                .await?;
            Ok(())
        }
        .await;

        if let Err(e) = result {
            tracing::warn!(error = %e, user_id, "Counter update failed");
        }
    }

    /// Arm the per-topic cooldown. Critical events do not set cooldowns.
    async fn register_cooldown(&self, event: &NotificationEvent) {
        if event.is_critical() {
            return;
        }
        let key = keys::cooldown(&event.user_id, &event.event_type);
        let ttl = Duration::from_secs(self.config.default_cooldown_seconds);
        if let Err(e) = self.kv.set(&key, "1", ttl).await {
            tracing::warn!(error = %e, "Failed to register topic cooldown");
        }
    }
}
