//! The per-event evaluation pipeline.
//!
//! Stages: L0 expiry, L1 dedup, L2 rules, L3 context, L4 scoring,
//! L5 arbitration, L6 dispatch. Hard rules short-circuit past the
//! expensive context and scoring stages. Every terminal outcome, including
//! early suppressions, goes through the dispatcher so exactly one audit
//! row exists per decision.

use std::sync::Arc;

use chrono::Utc;
use futures::future::join_all;
use sqlx::PgPool;
use tokio::sync::Semaphore;
use triage_bus::MessageBus;
use triage_core::arbiter::{arbitrate, ArbiterOutcome};
use triage_core::context::UserContext;
use triage_core::event::NotificationEvent;
use triage_core::scoring::{score_reason_step, ScoringResult};
use triage_core::types::{layers, Decision, DecisionResult, ReasonStep};
use triage_kv::KvStore;
use uuid::Uuid;

use crate::config::EngineConfig;
use crate::dedup::DedupGuard;
use crate::dispatcher::{DispatchRequest, Dispatcher};
use crate::enricher::ContextEnricher;
use crate::error::EngineError;
use crate::rules::RulesEngine;
use crate::scorer::Scorer;

/// Concurrent pipeline executions per batch-evaluate call.
const BATCH_CONCURRENCY: usize = 20;

/// The full evaluation pipeline, shared across requests.
pub struct Pipeline {
    dedup: DedupGuard,
    rules: Arc<RulesEngine>,
    enricher: ContextEnricher,
    scorer: Scorer,
    dispatcher: Dispatcher,
    config: Arc<EngineConfig>,
    batch_permits: Arc<Semaphore>,
}

impl Pipeline {
    pub fn new(
        kv: Arc<dyn KvStore>,
        bus: Arc<dyn MessageBus>,
        rules: Arc<RulesEngine>,
        config: Arc<EngineConfig>,
    ) -> Self {
        Self {
            dedup: DedupGuard::new(Arc::clone(&kv), Arc::clone(&config)),
            rules,
            enricher: ContextEnricher::new(Arc::clone(&kv), Arc::clone(&config)),
            scorer: Scorer::new(Arc::clone(&config)),
            dispatcher: Dispatcher::new(kv, bus, Arc::clone(&config)),
            config,
            batch_permits: Arc::new(Semaphore::new(BATCH_CONCURRENCY)),
        }
    }

    /// Run the full pipeline for one event.
    pub async fn evaluate(
        &self,
        pool: &PgPool,
        event: &NotificationEvent,
        event_id: Option<Uuid>,
    ) -> Result<DecisionResult, EngineError> {
        let event_id = event_id.unwrap_or_else(Uuid::new_v4);
        let started = std::time::Instant::now();

        tracing::info!(
            event_id = %event_id,
            user_id = %event.user_id,
            event_type = %event.event_type,
            priority_hint = ?event.priority_hint,
            "Pipeline started"
        );

        // L0: expiry check.
        let now = Utc::now();
        if event.is_expired(now) {
            tracing::info!(event_id = %event_id, "Expired on arrival");
            let step = ReasonStep::new(
                layers::INGESTION,
                "expiry_check",
                "NEVER",
                format!(
                    "Event expired at {} — suppressed on arrival",
                    event.expires_at.map(|t| t.to_rfc3339()).unwrap_or_default()
                ),
            );
            let fingerprint = triage_core::fingerprint::compute_fingerprint(event);
            return self
                .dispatch_suppressed(pool, event_id, event, fingerprint, vec![step])
                .await;
        }

        // L1: deduplication.
        let dedup = self.dedup.run(event).await;
        if let Some(reason) = dedup.suppress_reason {
            tracing::info!(event_id = %event_id, reason, "Suppressed by dedup");
            return self
                .dispatch_suppressed(pool, event_id, event, dedup.fingerprint, dedup.steps)
                .await;
        }

        // L2: rules.
        let verdict = self.rules.evaluate(event, Some(pool)).await;

        // Hard rules skip context and scoring.
        if matches!(verdict.decision, Some(Decision::Now) | Some(Decision::Never)) {
            let decision = verdict.decision.unwrap_or(Decision::Never);
            let rule_name = verdict.rule_name.as_deref().unwrap_or("unnamed");
            let scoring = ScoringResult::for_hard_rule(decision, rule_name);
            let score_step = ReasonStep::new(
                layers::SCORER,
                "skipped",
                "SKIPPED",
                "AI scoring skipped — hard rule already decided",
            );
            let ctx = UserContext::new(&event.user_id);
            let outcome = arbitrate(
                event,
                verdict.decision,
                verdict.rule_name.as_deref(),
                &scoring,
                &ctx,
                dedup.steps,
                verdict.steps,
                score_step,
                self.config.score_thresholds(),
                Utc::now(),
            );
            return self
                .finish(pool, event_id, event, dedup.fingerprint, &scoring, outcome, started)
                .await;
        }

        // L3: context enrichment.
        let ctx = self.enricher.enrich(event, Some(pool)).await;

        // L4: scoring.
        let scoring = self.scorer.score(event, &ctx, Some(pool), event_id).await;
        let score_step = score_reason_step(&scoring);

        // L5: arbitration.
        let outcome = arbitrate(
            event,
            verdict.decision,
            verdict.rule_name.as_deref(),
            &scoring,
            &ctx,
            dedup.steps,
            verdict.steps,
            score_step,
            self.config.score_thresholds(),
            Utc::now(),
        );

        // L6: dispatch.
        self.finish(pool, event_id, event, dedup.fingerprint, &scoring, outcome, started)
            .await
    }

    /// Evaluate up to [`MAX_BATCH_SIZE`](triage_core::event::MAX_BATCH_SIZE)
    /// events concurrently, preserving input order. A per-item failure maps
    /// to a synthetic LATER decision so one bad event never fails the batch.
    pub async fn evaluate_batch(
        &self,
        pool: &PgPool,
        events: &[NotificationEvent],
    ) -> Vec<DecisionResult> {
        let tasks = events.iter().map(|event| {
            let permits = Arc::clone(&self.batch_permits);
            async move {
                let _permit = permits.acquire().await.expect("semaphore never closed");
                let event_id = Uuid::new_v4();
                match self.evaluate(pool, event, Some(event_id)).await {
                    Ok(result) => result,
                    Err(e) => {
                        tracing::error!(event_id = %event_id, error = %e, "Batch item failed");
                        fail_safe_result(event_id, event, &e)
                    }
                }
            }
        });
        join_all(tasks).await
    }

    async fn dispatch_suppressed(
        &self,
        pool: &PgPool,
        event_id: Uuid,
        event: &NotificationEvent,
        fingerprint: String,
        steps: Vec<ReasonStep>,
    ) -> Result<DecisionResult, EngineError> {
        self.dispatcher
            .dispatch(
                pool,
                DispatchRequest {
                    event_id,
                    event,
                    fingerprint,
                    decision: Decision::Never,
                    score: None,
                    scheduled_at: None,
                    reason_chain: steps,
                    ai_used: false,
                    fallback_used: false,
                    rule_matched: None,
                },
            )
            .await
    }

    #[allow(clippy::too_many_arguments)]
    async fn finish(
        &self,
        pool: &PgPool,
        event_id: Uuid,
        event: &NotificationEvent,
        fingerprint: String,
        scoring: &ScoringResult,
        outcome: ArbiterOutcome,
        started: std::time::Instant,
    ) -> Result<DecisionResult, EngineError> {
        let result = self
            .dispatcher
            .dispatch(
                pool,
                DispatchRequest {
                    event_id,
                    event,
                    fingerprint,
                    decision: outcome.decision,
                    score: Some(scoring.score),
                    scheduled_at: outcome.scheduled_at,
                    reason_chain: outcome.reason_chain,
                    ai_used: scoring.ai_used,
                    fallback_used: scoring.fallback_used,
                    rule_matched: outcome.override_note,
                },
            )
            .await?;

        tracing::info!(
            event_id = %event_id,
            decision = result.decision.as_str(),
            score = scoring.score,
            ai_used = scoring.ai_used,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Pipeline complete"
        );
        Ok(result)
    }
}

/// Synthetic LATER result for an unexpected per-item pipeline error.
pub fn fail_safe_result(
    event_id: Uuid,
    event: &NotificationEvent,
    error: &EngineError,
) -> DecisionResult {
    DecisionResult {
        event_id,
        user_id: event.user_id.clone(),
        decision: Decision::Later,
        score: None,
        scheduled_at: None,
        reason_chain: vec![ReasonStep::new(
            layers::ERROR,
            "pipeline_error",
            "LATER",
            format!("Pipeline error: {error} — deferred as safe default"),
        )],
        ai_used: false,
        fallback_used: true,
        processed_at: Utc::now(),
    }
}
