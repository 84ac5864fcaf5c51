//! AI interaction log model.

use serde::Serialize;
use sqlx::FromRow;
use triage_core::types::Timestamp;
use uuid::Uuid;

/// A row from the `ai_interaction_logs` table: one per scoring call,
/// whether the LLM answered or the heuristic fallback ran.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct AiInteractionLog {
    pub id: Uuid,
    pub event_id: Uuid,
    pub user_id: String,
    pub event_type: String,
    pub prompt: String,
    pub response: Option<serde_json::Value>,
    pub ai_used: bool,
    pub fallback_reason: Option<String>,
    pub score: Option<f64>,
    pub decision: Option<String>,
    pub urgency: Option<f64>,
    pub engagement: Option<f64>,
    pub fatigue_penalty: Option<f64>,
    pub recency_bonus: Option<f64>,
    pub reasoning: Option<String>,
    pub created_at: Timestamp,
}
