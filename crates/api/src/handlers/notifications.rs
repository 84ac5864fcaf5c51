//! Handlers for the `/v1/notifications` resource: evaluation, audit
//! retrieval, history, and AI logs.

use axum::extract::{Path, Query, State};
use axum::Json;
use chrono::Utc;
use serde::Deserialize;
use triage_core::error::CoreError;
use triage_core::event::{NotificationEvent, MAX_BATCH_SIZE};
use triage_core::types::{DecisionResult, Timestamp};
use triage_db::repositories::{AiLogRepo, AuditRepo, EventRepo};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::state::AppState;

/// Maximum page size for history and AI-log listings.
const MAX_LIMIT: i64 = 100;

/// Default page size for history and AI-log listings.
const DEFAULT_LIMIT: i64 = 20;

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

/// Body of `POST /v1/notifications/batch-evaluate`.
#[derive(Debug, Deserialize)]
pub struct BatchEvaluateRequest {
    pub events: Vec<NotificationEvent>,
}

/// Response of `POST /v1/notifications/batch-evaluate`; `results` preserves
/// the input order.
#[derive(Debug, serde::Serialize)]
pub struct BatchDecisionResult {
    pub batch_id: Uuid,
    pub total: usize,
    pub results: Vec<DecisionResult>,
    pub processed_at: Timestamp,
}

/// Query parameters for paged listings.
#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub user_id: Option<String>,
    pub limit: Option<i64>,
}

fn clamp_limit(limit: Option<i64>) -> i64 {
    limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT)
}

// ---------------------------------------------------------------------------
// Evaluation
// ---------------------------------------------------------------------------

/// POST /v1/notifications/evaluate
///
/// Runs the full Now/Later/Never pipeline and returns a structured decision
/// with its reason chain.
pub async fn evaluate(
    State(state): State<AppState>,
    Json(event): Json<NotificationEvent>,
) -> AppResult<Json<DecisionResult>> {
    event.validate()?;
    let result = state.pipeline.evaluate(&state.pool, &event, None).await?;
    Ok(Json(result))
}

/// POST /v1/notifications/batch-evaluate
///
/// Evaluates up to 500 events concurrently. Per-item pipeline failures map
/// to synthetic LATER decisions; the batch itself only fails on invalid
/// input.
pub async fn evaluate_batch(
    State(state): State<AppState>,
    Json(request): Json<BatchEvaluateRequest>,
) -> AppResult<Json<BatchDecisionResult>> {
    if request.events.is_empty() || request.events.len() > MAX_BATCH_SIZE {
        return Err(AppError::Core(CoreError::Validation(format!(
            "batch must contain between 1 and {MAX_BATCH_SIZE} events (got {})",
            request.events.len()
        ))));
    }
    for event in &request.events {
        event.validate()?;
    }

    let results = state
        .pipeline
        .evaluate_batch(&state.pool, &request.events)
        .await;

    Ok(Json(BatchDecisionResult {
        batch_id: Uuid::new_v4(),
        total: results.len(),
        results,
        processed_at: Utc::now(),
    }))
}

// ---------------------------------------------------------------------------
// Audit & history
// ---------------------------------------------------------------------------

/// GET /v1/notifications/audit/{event_id}
///
/// Returns the complete decision chain, scoring flags, and raw event for
/// one evaluation, including suppressed and errored events.
pub async fn get_audit(
    State(state): State<AppState>,
    Path(event_id): Path<Uuid>,
) -> AppResult<Json<serde_json::Value>> {
    let entry = AuditRepo::get_by_event_id(&state.pool, event_id)
        .await?
        .ok_or_else(|| {
            AppError::Core(CoreError::NotFound {
                entity: "AuditEntry",
                id: event_id.to_string(),
            })
        })?;
    Ok(Json(serde_json::json!({
        "event_id": entry.event_id,
        "user_id": entry.user_id,
        "event_type": entry.event_type,
        "decision": entry.decision,
        "score": entry.score,
        "ai_used": entry.ai_used,
        "fallback_used": entry.fallback_used,
        "rule_matched": entry.rule_matched,
        "reason_chain": entry.reason_chain,
        "raw_event": entry.raw_event,
        "created_at": entry.created_at,
    })))
}

/// GET /v1/notifications/history/{user_id}
///
/// Recent decisions for a user, newest first.
pub async fn get_history(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Query(query): Query<ListQuery>,
) -> AppResult<Json<serde_json::Value>> {
    let limit = clamp_limit(query.limit);
    let events = EventRepo::list_for_user(&state.pool, &user_id, limit).await?;
    let items: Vec<serde_json::Value> = events
        .iter()
        .map(|e| {
            serde_json::json!({
                "event_id": e.id,
                "event_type": e.event_type,
                "title": e.title,
                "decision": e.decision,
                "score": e.score,
                "ai_used": e.ai_used,
                "created_at": e.created_at,
            })
        })
        .collect();
    Ok(Json(serde_json::json!({
        "user_id": user_id,
        "count": items.len(),
        "events": items,
    })))
}

/// GET /v1/notifications/ai-logs
///
/// Stored LLM prompts and responses for inspection and debugging.
pub async fn get_ai_logs(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> AppResult<Json<serde_json::Value>> {
    let limit = clamp_limit(query.limit);
    let logs = AiLogRepo::list(&state.pool, query.user_id.as_deref(), limit).await?;
    Ok(Json(serde_json::json!({
        "count": logs.len(),
        "logs": logs,
    })))
}
