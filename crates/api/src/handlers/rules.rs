//! Handlers for the `/v1/rules` resource.
//!
//! Every mutation invalidates the in-process rules cache, so changes take
//! effect within the cache TTL without a deployment.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use serde::Deserialize;
use triage_core::error::CoreError;
use triage_db::models::rule::{Rule, RuleInput};
use triage_db::repositories::RuleRepo;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::state::AppState;

/// Query parameters for `GET /v1/rules`.
#[derive(Debug, Deserialize)]
pub struct RuleListQuery {
    pub active_only: Option<bool>,
}

fn not_found(id: Uuid) -> AppError {
    AppError::Core(CoreError::NotFound {
        entity: "Rule",
        id: id.to_string(),
    })
}

/// GET /v1/rules
pub async fn list_rules(
    State(state): State<AppState>,
    Query(query): Query<RuleListQuery>,
) -> AppResult<Json<Vec<Rule>>> {
    let rules = RuleRepo::list(&state.pool, query.active_only.unwrap_or(false)).await?;
    Ok(Json(rules))
}

/// POST /v1/rules
///
/// Creates a rule; 409 when the name is already taken.
pub async fn create_rule(
    State(state): State<AppState>,
    Json(input): Json<RuleInput>,
) -> AppResult<(StatusCode, Json<Rule>)> {
    input.validate()?;

    if RuleRepo::get_by_name(&state.pool, &input.rule_name)
        .await?
        .is_some()
    {
        return Err(AppError::Core(CoreError::Conflict(format!(
            "Rule '{}' already exists",
            input.rule_name
        ))));
    }

    let now = Utc::now();
    let rule = Rule {
        id: Uuid::new_v4(),
        rule_name: input.rule_name,
        rule_type: input.rule_type,
        conditions: input.conditions,
        action_params: input.action_params,
        priority_order: input.priority_order,
        is_active: input.is_active,
        created_at: now,
        updated_at: now,
    };
    RuleRepo::create(&state.pool, &rule).await?;
    state.rules.invalidate().await;

    tracing::info!(rule_name = %rule.rule_name, rule_id = %rule.id, "Rule created");
    Ok((StatusCode::CREATED, Json(rule)))
}

/// PUT /v1/rules/{id}
pub async fn update_rule(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(input): Json<RuleInput>,
) -> AppResult<Json<Rule>> {
    input.validate()?;

    let existing = RuleRepo::get_by_id(&state.pool, id)
        .await?
        .ok_or_else(|| not_found(id))?;

    let rule = Rule {
        id,
        rule_name: input.rule_name,
        rule_type: input.rule_type,
        conditions: input.conditions,
        action_params: input.action_params,
        priority_order: input.priority_order,
        is_active: input.is_active,
        created_at: existing.created_at,
        updated_at: Utc::now(),
    };
    RuleRepo::update(&state.pool, &rule).await?;
    state.rules.invalidate().await;

    tracing::info!(rule_id = %id, rule_name = %rule.rule_name, "Rule updated");
    Ok(Json(rule))
}

/// PATCH /v1/rules/{id}/toggle
pub async fn toggle_rule(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<serde_json::Value>> {
    let is_active = RuleRepo::toggle(&state.pool, id)
        .await?
        .ok_or_else(|| not_found(id))?;
    state.rules.invalidate().await;

    Ok(Json(serde_json::json!({
        "rule_id": id,
        "is_active": is_active,
        "message": "Rule toggled",
    })))
}

/// DELETE /v1/rules/{id}
pub async fn delete_rule(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<serde_json::Value>> {
    let deleted = RuleRepo::delete(&state.pool, id).await?;
    if !deleted {
        return Err(not_found(id));
    }
    state.rules.invalidate().await;

    tracing::info!(rule_id = %id, "Rule deleted");
    Ok(Json(serde_json::json!({
        "message": format!("Rule {id} deleted"),
    })))
}
