//! Handlers for the `/v1/users` resource: notification profile, preference
//! updates, topic opt-outs, and the engagement feedback loop.

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;
use triage_core::context::is_dnd_active;
use triage_core::error::CoreError;
use triage_core::heatmap::{apply_feedback, top_send_hours, FeedbackAction};
use triage_db::models::profile::PreferenceUpdate;
use triage_db::repositories::{EventRepo, ProfileRepo};
use triage_engine::enricher::current_local_hour;
use triage_kv::{keys, KvStore};

use crate::error::{AppError, AppResult};
use crate::state::AppState;

/// How many optimal send hours the profile endpoint reports.
const OPTIMAL_HOURS: usize = 5;

/// How many recent decisions the profile endpoint embeds.
const RECENT_DECISIONS: i64 = 10;

/// GET /v1/users/{user_id}/notification-profile
///
/// The user's preferences, live fatigue counters, DND state, best send
/// hours, and recent decisions in one view.
pub async fn notification_profile(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> AppResult<Json<serde_json::Value>> {
    let profile = ProfileRepo::get_or_create(&state.pool, &user_id).await?;

    let read_counter = |key: String| {
        let kv = state.kv.clone();
        async move {
            kv.get(&key)
                .await
                .ok()
                .flatten()
                .and_then(|v| v.parse::<i64>().ok())
                .unwrap_or(0)
        }
    };
    let (count_1h, count_24h) = tokio::join!(
        read_counter(keys::count_1h(&user_id)),
        read_counter(keys::count_24h(&user_id)),
    );

    let current_hour = current_local_hour(&profile.timezone);
    let dnd_start = profile.dnd_start_hour.clamp(0, 23) as u32;
    let dnd_end = profile.dnd_end_hour.clamp(0, 24) as u32;
    let dnd_active = is_dnd_active(dnd_start, dnd_end, current_hour);

    let heatmap = profile.heatmap_vec();
    let optimal = top_send_hours(&heatmap, dnd_start, dnd_end, OPTIMAL_HOURS);

    let recent = EventRepo::list_for_user(&state.pool, &user_id, RECENT_DECISIONS).await?;
    let recent_decisions: Vec<serde_json::Value> = recent
        .iter()
        .map(|e| {
            serde_json::json!({
                "event_id": e.id,
                "event_type": e.event_type,
                "decision": e.decision,
                "score": e.score,
                "created_at": e.created_at,
            })
        })
        .collect();

    Ok(Json(serde_json::json!({
        "user_id": user_id,
        "notifications_last_1h": count_1h,
        "notifications_last_24h": count_24h,
        "dnd_active": dnd_active,
        "dnd_start_hour": dnd_start,
        "dnd_end_hour": dnd_end,
        "timezone": profile.timezone,
        "hourly_cap": profile
            .hourly_cap_override
            .map(i64::from)
            .unwrap_or(state.engine_config.default_hourly_cap),
        "daily_cap": profile
            .daily_cap_override
            .map(i64::from)
            .unwrap_or(state.engine_config.default_daily_cap),
        "opted_out_topics": profile.opted_out_topic_list(),
        "optimal_send_hours": optimal,
        "recent_decisions": recent_decisions,
    })))
}

/// PATCH /v1/users/{user_id}/preferences
///
/// Partial preference update; busts the cached profile.
pub async fn update_preferences(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Json(update): Json<PreferenceUpdate>,
) -> AppResult<Json<serde_json::Value>> {
    update.validate()?;
    let mut profile = ProfileRepo::get_or_create(&state.pool, &user_id).await?;

    if let Some(hour) = update.dnd_start_hour {
        profile.dnd_start_hour = hour;
    }
    if let Some(hour) = update.dnd_end_hour {
        profile.dnd_end_hour = hour;
    }
    if let Some(timezone) = update.timezone {
        profile.timezone = timezone;
    }
    if let Some(preferences) = update.channel_preferences {
        profile.channel_preferences = preferences;
    }
    if let Some(topics) = update.opted_out_topics {
        profile.opted_out_topics = serde_json::json!(topics);
    }
    if let Some(cap) = update.hourly_cap_override {
        profile.hourly_cap_override = Some(cap);
    }
    if let Some(cap) = update.daily_cap_override {
        profile.daily_cap_override = Some(cap);
    }

    ProfileRepo::update(&state.pool, &profile).await?;
    invalidate_profile_cache(&state, &user_id).await;

    Ok(Json(serde_json::json!({
        "message": "Preferences updated",
        "user_id": user_id,
    })))
}

/// POST /v1/users/{user_id}/opt-out/{topic}
pub async fn opt_out_topic(
    State(state): State<AppState>,
    Path((user_id, topic)): Path<(String, String)>,
) -> AppResult<Json<serde_json::Value>> {
    let mut profile = ProfileRepo::get_or_create(&state.pool, &user_id).await?;
    let mut topics = profile.opted_out_topic_list();
    if !topics.contains(&topic) {
        topics.push(topic.clone());
        profile.opted_out_topics = serde_json::json!(topics);
        ProfileRepo::update(&state.pool, &profile).await?;
    }
    invalidate_profile_cache(&state, &user_id).await;

    Ok(Json(serde_json::json!({
        "message": format!("User {user_id} opted out of '{topic}'"),
        "all_opt_outs": topics,
    })))
}

/// DELETE /v1/users/{user_id}/opt-out/{topic}
pub async fn opt_in_topic(
    State(state): State<AppState>,
    Path((user_id, topic)): Path<(String, String)>,
) -> AppResult<Json<serde_json::Value>> {
    let mut profile = ProfileRepo::get_or_create(&state.pool, &user_id).await?;
    let topics: Vec<String> = profile
        .opted_out_topic_list()
        .into_iter()
        .filter(|t| t != &topic)
        .collect();
    profile.opted_out_topics = serde_json::json!(topics);
    ProfileRepo::update(&state.pool, &profile).await?;
    invalidate_profile_cache(&state, &user_id).await;

    Ok(Json(serde_json::json!({
        "message": format!("User {user_id} re-subscribed to '{topic}'"),
        "all_opt_outs": topics,
    })))
}

/// Query parameters for the feedback endpoint.
#[derive(Debug, Deserialize)]
pub struct FeedbackQuery {
    pub event_id: String,
    pub action: String,
}

/// POST /v1/users/{user_id}/feedback
///
/// Feedback loop: interactions nudge the engagement heatmap entry for the
/// user's current local hour (the send-time picker indexes the heatmap by
/// local hour, so the update must too).
pub async fn record_feedback(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Query(query): Query<FeedbackQuery>,
) -> AppResult<Json<serde_json::Value>> {
    let action: FeedbackAction = query
        .action
        .parse()
        .map_err(|e: String| AppError::Core(CoreError::Validation(e)))?;

    let mut profile = ProfileRepo::get_or_create(&state.pool, &user_id).await?;
    let mut heatmap = profile.heatmap_vec();
    let hour = current_local_hour(&profile.timezone) as usize;
    apply_feedback(&mut heatmap, hour, action);
    profile.engagement_heatmap = serde_json::json!(heatmap);
    ProfileRepo::update(&state.pool, &profile).await?;
    invalidate_profile_cache(&state, &user_id).await;

    tracing::info!(
        user_id = %user_id,
        event_id = %query.event_id,
        action = %query.action,
        hour,
        "Feedback recorded"
    );

    Ok(Json(serde_json::json!({
        "message": "Feedback recorded",
        "user_id": user_id,
        "action": query.action,
    })))
}

async fn invalidate_profile_cache(state: &AppState, user_id: &str) {
    if let Err(e) = state.kv.delete(&keys::user_profile(user_id)).await {
        tracing::warn!(error = %e, user_id, "Profile cache invalidation failed");
    }
}
