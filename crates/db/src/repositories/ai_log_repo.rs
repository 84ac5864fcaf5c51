//! Repository for the `ai_interaction_logs` table.

use sqlx::PgPool;

use crate::models::ai_log::AiInteractionLog;

/// Column list for `ai_interaction_logs` queries.
const COLUMNS: &str = "id, event_id, user_id, event_type, prompt, response, ai_used, \
     fallback_reason, score, decision, urgency, engagement, fatigue_penalty, recency_bonus, \
     reasoning, created_at";

/// Provides access to AI interaction logs.
pub struct AiLogRepo;

impl AiLogRepo {
    pub async fn insert(pool: &PgPool, log: &AiInteractionLog) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO ai_interaction_logs \
             (id, event_id, user_id, event_type, prompt, response, ai_used, fallback_reason, \
              score, decision, urgency, engagement, fatigue_penalty, recency_bonus, reasoning, \
              created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)",
        )
        .bind(log.id)
        .bind(log.event_id)
        .bind(&log.user_id)
        .bind(&log.event_type)
        .bind(&log.prompt)
        .bind(&log.response)
        .bind(log.ai_used)
        .bind(&log.fallback_reason)
        .bind(log.score)
        .bind(&log.decision)
        .bind(log.urgency)
        .bind(log.engagement)
        .bind(log.fatigue_penalty)
        .bind(log.recency_bonus)
        .bind(&log.reasoning)
        .bind(log.created_at)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Recent interaction logs, newest first, optionally filtered by user.
    pub async fn list(
        pool: &PgPool,
        user_id: Option<&str>,
        limit: i64,
    ) -> Result<Vec<AiInteractionLog>, sqlx::Error> {
        match user_id {
            Some(user_id) => {
                sqlx::query_as::<_, AiInteractionLog>(&format!(
                    "SELECT {COLUMNS} FROM ai_interaction_logs \
                     WHERE user_id = $1 \
                     ORDER BY created_at DESC \
                     LIMIT $2"
                ))
                .bind(user_id)
                .bind(limit)
                .fetch_all(pool)
                .await
            }
            None => {
                sqlx::query_as::<_, AiInteractionLog>(&format!(
                    "SELECT {COLUMNS} FROM ai_interaction_logs \
                     ORDER BY created_at DESC \
                     LIMIT $1"
                ))
                .bind(limit)
                .fetch_all(pool)
                .await
            }
        }
    }
}
