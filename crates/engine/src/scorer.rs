//! AI scorer — Groq chat-completions call with a circuit breaker and a
//! deterministic heuristic fallback.
//!
//! The LLM is consumed as a black-box JSON oracle: the prompt spells out
//! the exact weighting formula and demands a JSON-only response. Failures
//! (timeout, transport, non-JSON, open breaker) degrade to the heuristic;
//! the caller never sees an error. Every call, either path, is logged to
//! the `ai_interaction_logs` table when a database session is available.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use sqlx::PgPool;
use triage_core::breaker::CircuitBreaker;
use triage_core::context::UserContext;
use triage_core::event::NotificationEvent;
use triage_core::scoring::{heuristic_score, ScoringResult};
use triage_core::types::Decision;
use triage_db::models::ai_log::AiInteractionLog;
use triage_db::repositories::AiLogRepo;
use uuid::Uuid;

use crate::config::EngineConfig;

/// Consecutive failures before the breaker opens.
const BREAKER_FAILURE_THRESHOLD: u32 = 3;

/// How long the breaker stays open before admitting a probe.
const BREAKER_RECOVERY_TIMEOUT: Duration = Duration::from_secs(30);

/// Message body length cap inside the prompt.
const PROMPT_MESSAGE_LIMIT: usize = 300;

#[derive(Debug, thiserror::Error)]
enum LlmError {
    #[error("LLM call timed out")]
    Timeout,

    #[error("LLM transport error: {0}")]
    Transport(String),

    #[error("LLM returned HTTP {0}")]
    Status(u16),

    #[error("LLM response was not the expected JSON: {0}")]
    Parse(String),
}

impl LlmError {
    fn fallback_reason(&self) -> &'static str {
        match self {
            LlmError::Timeout => "llm_timeout",
            LlmError::Transport(_) => "llm_error:transport",
            LlmError::Status(_) => "llm_error:status",
            LlmError::Parse(_) => "llm_error:parse",
        }
    }
}

/// Scores events, preferring the LLM and falling back to the heuristic.
pub struct Scorer {
    http: reqwest::Client,
    breaker: CircuitBreaker,
    config: Arc<EngineConfig>,
}

impl Scorer {
    pub fn new(config: Arc<EngineConfig>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(config.groq_timeout)
            .build()
            .expect("Failed to build reqwest HTTP client");
        Self {
            http,
            breaker: CircuitBreaker::new(BREAKER_FAILURE_THRESHOLD, BREAKER_RECOVERY_TIMEOUT),
            config,
        }
    }

    /// Score one event. Always returns a result; the `fallback_used` flag
    /// and the AI log row record which path ran.
    pub async fn score(
        &self,
        event: &NotificationEvent,
        ctx: &UserContext,
        pool: Option<&PgPool>,
        event_id: Uuid,
    ) -> ScoringResult {
        let prompt = build_prompt(event, ctx);

        if self.config.groq_api_key.is_empty() {
            let result = self.heuristic(event, ctx, "heuristic_primary");
            self.log_interaction(pool, event_id, event, &prompt, &result, None, Some("heuristic_primary"))
                .await;
            return result;
        }

        if !self.breaker.try_acquire() {
            tracing::warn!("Scoring circuit open, using heuristic");
            let result = self.heuristic(event, ctx, "circuit_breaker_open");
            self.log_interaction(
                pool,
                event_id,
                event,
                &prompt,
                &result,
                None,
                Some("circuit_breaker_open"),
            )
            .await;
            return result;
        }

        match self.call_llm(&prompt).await {
            Ok(raw) => {
                self.breaker.record_success();
                let result = parse_llm_response(&raw);
                tracing::info!(
                    score = result.score,
                    decision = result.decision_hint.as_str(),
                    "LLM scoring succeeded"
                );
                self.log_interaction(pool, event_id, event, &prompt, &result, Some(raw), None)
                    .await;
                result
            }
            Err(e) => {
                self.breaker.record_failure();
                let reason = e.fallback_reason();
                tracing::warn!(error = %e, reason, "LLM scoring failed, using heuristic");
                let result = self.heuristic(event, ctx, reason);
                self.log_interaction(pool, event_id, event, &prompt, &result, None, Some(reason))
                    .await;
                result
            }
        }
    }

    fn heuristic(
        &self,
        event: &NotificationEvent,
        ctx: &UserContext,
        fallback_reason: &str,
    ) -> ScoringResult {
        heuristic_score(
            event,
            ctx,
            self.config.default_cooldown_seconds,
            self.config.score_thresholds(),
            fallback_reason,
        )
    }

    /// One chat-completions request, hard-capped by the configured timeout.
    async fn call_llm(&self, prompt: &str) -> Result<serde_json::Value, LlmError> {
        let url = format!(
            "{}/chat/completions",
            self.config.groq_api_base.trim_end_matches('/')
        );
        let body = serde_json::json!({
            "model": self.config.groq_model,
            "messages": [{"role": "user", "content": prompt}],
            "response_format": {"type": "json_object"},
            "temperature": 0.1,
            "max_tokens": 256,
        });

        let request = self
            .http
            .post(url)
            .bearer_auth(&self.config.groq_api_key)
            .json(&body)
            .send();

        let response = tokio::time::timeout(self.config.groq_timeout, request)
            .await
            .map_err(|_| LlmError::Timeout)?
            .map_err(|e| {
                if e.is_timeout() {
                    LlmError::Timeout
                } else {
                    LlmError::Transport(e.to_string())
                }
            })?;

        if !response.status().is_success() {
            return Err(LlmError::Status(response.status().as_u16()));
        }

        let envelope: serde_json::Value = response
            .json()
            .await
            .map_err(|e| LlmError::Parse(e.to_string()))?;

        let content = envelope["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| LlmError::Parse("missing choices[0].message.content".into()))?;

        serde_json::from_str(content).map_err(|e| LlmError::Parse(e.to_string()))
    }

    /// Persist the prompt, raw response, and parsed sub-scores.
    #[allow(clippy::too_many_arguments)]
    async fn log_interaction(
        &self,
        pool: Option<&PgPool>,
        event_id: Uuid,
        event: &NotificationEvent,
        prompt: &str,
        result: &ScoringResult,
        raw_response: Option<serde_json::Value>,
        fallback_reason: Option<&str>,
    ) {
        let Some(pool) = pool else {
            return;
        };
        let row = AiInteractionLog {
            id: Uuid::new_v4(),
            event_id,
            user_id: event.user_id.clone(),
            event_type: event.event_type.clone(),
            prompt: prompt.to_string(),
            response: raw_response,
            ai_used: result.ai_used,
            fallback_reason: fallback_reason.map(ToString::to_string),
            score: Some(result.score),
            decision: Some(result.decision_hint.as_str().to_string()),
            urgency: Some(result.urgency),
            engagement: Some(result.engagement),
            fatigue_penalty: Some(result.fatigue_penalty),
            recency_bonus: Some(result.recency_bonus),
            reasoning: Some(result.reasoning.clone()),
            created_at: Utc::now(),
        };
        if let Err(e) = AiLogRepo::insert(pool, &row).await {
            tracing::warn!(error = %e, "Failed to save AI interaction log");
        }
    }
}

/// The fixed-structure scoring prompt.
pub fn build_prompt(event: &NotificationEvent, ctx: &UserContext) -> String {
    let message: String = event.message.chars().take(PROMPT_MESSAGE_LIMIT).collect();
    let priority_hint = event
        .priority_hint
        .map(|h| h.as_str())
        .unwrap_or("none");
    let last_sent = ctx
        .seconds_since_last_same_type
        .map(|s| format!("{s:.0}"))
        .unwrap_or_else(|| "never_sent".to_string());

    format!(
        "You are a notification prioritization engine. Analyze this notification and return \
         ONLY valid JSON — no explanation, no markdown.\n\
         \n\
         NOTIFICATION EVENT:\n\
         - event_type: {event_type}\n\
         - title: {title}\n\
         - message: {message}\n\
         - source: {source}\n\
         - channel: {channel}\n\
         - priority_hint: {priority_hint}\n\
         \n\
         USER CONTEXT:\n\
         - notifications_sent_last_1h: {count_1h} (cap: {hourly_cap})\n\
         - notifications_sent_last_24h: {count_24h} (cap: {daily_cap})\n\
         - seconds_since_last_same_type: {last_sent}\n\
         - dnd_active: {dnd_active}\n\
         - current_local_hour: {local_hour}\n\
         - user_segment: {segment}\n\
         - engagement_at_current_hour: {engagement:.2}\n\
         - opted_out_topics: {opted_out:?}\n\
         \n\
         SCORING FORMULA: score = (0.35 * urgency) + (0.25 * engagement) - \
         (0.25 * fatigue_penalty) + (0.15 * recency_bonus)\n\
         \n\
         Return this exact JSON structure:\n\
         {{\n\
           \"score\": <float 0.0-1.0>,\n\
           \"decision\": \"<now|later|never>\",\n\
           \"urgency\": <float 0.0-1.0>,\n\
           \"engagement\": <float 0.0-1.0>,\n\
           \"fatigue_penalty\": <float 0.0-1.0>,\n\
           \"recency_bonus\": <float 0.0-1.0>,\n\
           \"reasoning\": \"<one sentence explanation>\"\n\
         }}",
        event_type = event.event_type,
        title = event.title,
        message = message,
        source = event.source,
        channel = event.channel.as_str(),
        priority_hint = priority_hint,
        count_1h = ctx.notifications_last_1h,
        hourly_cap = ctx.hourly_cap,
        count_24h = ctx.notifications_last_24h,
        daily_cap = ctx.daily_cap,
        last_sent = last_sent,
        dnd_active = ctx.dnd_active,
        local_hour = ctx.current_local_hour,
        segment = ctx.segment,
        engagement = ctx.engagement_score_for_current_hour(),
        opted_out = ctx.opted_out_topics,
    )
}

/// Map the model's JSON into a [`ScoringResult`], tolerating missing fields.
fn parse_llm_response(data: &serde_json::Value) -> ScoringResult {
    let float = |key: &str, default: f64| data.get(key).and_then(|v| v.as_f64()).unwrap_or(default);
    let decision = match data.get("decision").and_then(|v| v.as_str()) {
        Some("now") => Decision::Now,
        Some("never") => Decision::Never,
        _ => Decision::Later,
    };
    ScoringResult {
        score: float("score", 0.5),
        decision_hint: decision,
        urgency: float("urgency", 0.5),
        engagement: float("engagement", 0.5),
        fatigue_penalty: float("fatigue_penalty", 0.0),
        recency_bonus: float("recency_bonus", 0.5),
        reasoning: data
            .get("reasoning")
            .and_then(|v| v.as_str())
            .unwrap_or("AI scored this event")
            .to_string(),
        ai_used: true,
        fallback_used: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use triage_core::types::Channel;

    fn event() -> NotificationEvent {
        NotificationEvent {
            user_id: "u1".into(),
            event_type: "payment_failed".into(),
            title: "Payment failed".into(),
            message: "Your payment could not be processed".into(),
            source: "billing".into(),
            channel: Channel::Push,
            priority_hint: None,
            dedupe_key: None,
            expires_at: None,
            timestamp: None,
            metadata: serde_json::Map::new(),
        }
    }

    #[test]
    fn prompt_contains_event_context_and_formula() {
        let ctx = UserContext::new("u1");
        let prompt = build_prompt(&event(), &ctx);
        assert!(prompt.contains("event_type: payment_failed"));
        assert!(prompt.contains("seconds_since_last_same_type: never_sent"));
        assert!(prompt.contains(
            "score = (0.35 * urgency) + (0.25 * engagement) - (0.25 * fatigue_penalty) + \
             (0.15 * recency_bonus)"
        ));
        assert!(prompt.contains("\"decision\": \"<now|later|never>\""));
    }

    #[test]
    fn prompt_truncates_long_messages() {
        let mut e = event();
        e.message = "x".repeat(1000);
        let prompt = build_prompt(&e, &UserContext::new("u1"));
        assert!(!prompt.contains(&"x".repeat(400)));
    }

    #[test]
    fn llm_response_parses_fully() {
        let result = parse_llm_response(&json!({
            "score": 0.82,
            "decision": "now",
            "urgency": 0.9,
            "engagement": 0.7,
            "fatigue_penalty": 0.1,
            "recency_bonus": 0.6,
            "reasoning": "Urgent payment failure"
        }));
        assert_eq!(result.score, 0.82);
        assert_eq!(result.decision_hint, Decision::Now);
        assert!(result.ai_used);
        assert!(!result.fallback_used);
        assert_eq!(result.reasoning, "Urgent payment failure");
    }

    #[test]
    fn llm_response_defaults_missing_fields() {
        let result = parse_llm_response(&json!({}));
        assert_eq!(result.score, 0.5);
        assert_eq!(result.decision_hint, Decision::Later);
        assert_eq!(result.fatigue_penalty, 0.0);
    }

    #[tokio::test]
    async fn missing_api_key_uses_heuristic_primary() {
        let scorer = Scorer::new(Arc::new(EngineConfig::default()));
        let result = scorer
            .score(&event(), &UserContext::new("u1"), None, Uuid::new_v4())
            .await;
        assert!(!result.ai_used);
        assert!(result.fallback_used);
        assert!(result.reasoning.contains("heuristic_primary"));
    }

    #[tokio::test]
    async fn unreachable_endpoint_falls_back_and_opens_breaker() {
        let config = EngineConfig {
            groq_api_key: "test-key".into(),
            // Unroutable per RFC 5737; connection fails fast or times out.
            groq_api_base: "http://192.0.2.1:9/v1".into(),
            groq_timeout: Duration::from_millis(100),
            ..EngineConfig::default()
        };
        let scorer = Scorer::new(Arc::new(config));
        let ctx = UserContext::new("u1");

        for _ in 0..3 {
            let result = scorer.score(&event(), &ctx, None, Uuid::new_v4()).await;
            assert!(result.fallback_used);
            assert!(
                result.reasoning.contains("llm_timeout")
                    || result.reasoning.contains("llm_error:transport")
            );
        }

        // Breaker is now open; the next call short-circuits.
        let result = scorer.score(&event(), &ctx, None, Uuid::new_v4()).await;
        assert!(result.reasoning.contains("circuit_breaker_open"));
    }
}
