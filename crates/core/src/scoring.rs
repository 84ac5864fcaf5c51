//! Scoring result type and the deterministic heuristic scorer.
//!
//! The heuristic is both the fallback for LLM failures and the primary
//! scorer when no API key is configured. It applies the same weighting
//! formula the LLM is prompted with.

use crate::context::UserContext;
use crate::event::NotificationEvent;
use crate::types::{layers, Decision, PriorityHint, ReasonStep};

/// Weighting formula:
/// `score = 0.35*urgency + 0.25*engagement - 0.25*fatigue + 0.15*recency`.
pub const WEIGHT_URGENCY: f64 = 0.35;
pub const WEIGHT_ENGAGEMENT: f64 = 0.25;
pub const WEIGHT_FATIGUE: f64 = 0.25;
pub const WEIGHT_RECENCY: f64 = 0.15;

/// Urgency assumed for event types with no keyword match.
const UNKNOWN_URGENCY: f64 = 0.4;

/// Base urgency by event-type keyword, first containment match wins.
const URGENCY_KEYWORDS: &[(&str, f64)] = &[
    ("critical", 1.0),
    ("security", 1.0),
    ("payment_failed", 1.0),
    ("payment_declined", 1.0),
    ("2fa", 1.0),
    ("otp", 1.0),
    ("password", 0.9),
    ("account", 0.8),
    ("message", 0.7),
    ("reminder", 0.7),
    ("alert", 0.8),
    ("update", 0.5),
    ("system", 0.5),
    ("promo", 0.2),
    ("promotion", 0.2),
    ("marketing", 0.15),
    ("offer", 0.2),
    ("discount", 0.2),
    ("newsletter", 0.1),
];

/// Outcome of scoring one event, whether via LLM or heuristic.
#[derive(Debug, Clone)]
pub struct ScoringResult {
    pub score: f64,
    pub decision_hint: Decision,
    pub urgency: f64,
    pub engagement: f64,
    pub fatigue_penalty: f64,
    pub recency_bonus: f64,
    pub reasoning: String,
    pub ai_used: bool,
    pub fallback_used: bool,
}

impl ScoringResult {
    /// Synthetic result for events decided by a hard rule before scoring.
    pub fn for_hard_rule(decision: Decision, rule_name: &str) -> Self {
        let score = if decision == Decision::Now { 1.0 } else { 0.0 };
        Self {
            score,
            decision_hint: decision,
            urgency: score,
            engagement: 0.5,
            fatigue_penalty: 0.0,
            recency_bonus: 0.5,
            reasoning: format!("Hard rule '{rule_name}' applied"),
            ai_used: false,
            fallback_used: false,
        }
    }
}

/// Decision thresholds applied to a raw score.
#[derive(Debug, Clone, Copy)]
pub struct ScoreThresholds {
    pub now: f64,
    pub later: f64,
}

impl Default for ScoreThresholds {
    fn default() -> Self {
        Self { now: 0.75, later: 0.40 }
    }
}

impl ScoreThresholds {
    pub fn hint_for(&self, score: f64) -> Decision {
        if score >= self.now {
            Decision::Now
        } else if score >= self.later {
            Decision::Later
        } else {
            Decision::Never
        }
    }
}

/// Keyword-table urgency for a lowercased event type.
fn event_type_urgency(event_type: &str) -> f64 {
    let lowered = event_type.to_lowercase();
    URGENCY_KEYWORDS
        .iter()
        .find(|(keyword, _)| lowered.contains(keyword))
        .map(|&(_, urgency)| urgency)
        .unwrap_or(UNKNOWN_URGENCY)
}

fn hint_urgency(hint: PriorityHint) -> f64 {
    match hint {
        PriorityHint::Critical => 1.0,
        PriorityHint::High => 0.8,
        PriorityHint::Medium => 0.5,
        PriorityHint::Low => 0.2,
    }
}

/// Deterministic heuristic scoring, no external dependencies.
///
/// Urgency is the max of the keyword-table and priority-hint lookups; the
/// remaining sub-scores come straight from the user context. The final score
/// is clamped to `[0, 1]`.
pub fn heuristic_score(
    event: &NotificationEvent,
    ctx: &UserContext,
    default_cooldown_seconds: u64,
    thresholds: ScoreThresholds,
    fallback_reason: &str,
) -> ScoringResult {
    let mut urgency = event_type_urgency(&event.event_type);
    if let Some(hint) = event.priority_hint {
        urgency = urgency.max(hint_urgency(hint));
    }

    let engagement = ctx.engagement_score_for_current_hour();
    let fatigue_penalty = ctx.fatigue_ratio_1h();
    let recency_bonus = ctx.recency_bonus(default_cooldown_seconds);

    let score = (WEIGHT_URGENCY * urgency + WEIGHT_ENGAGEMENT * engagement
        - WEIGHT_FATIGUE * fatigue_penalty
        + WEIGHT_RECENCY * recency_bonus)
        .clamp(0.0, 1.0);

    ScoringResult {
        score,
        decision_hint: thresholds.hint_for(score),
        urgency,
        engagement,
        fatigue_penalty,
        recency_bonus,
        reasoning: format!(
            "Heuristic scorer ({fallback_reason}): urgency={urgency:.2}, fatigue={fatigue_penalty:.2}"
        ),
        ai_used: false,
        fallback_used: true,
    }
}

/// The reason step emitted by the scoring stage.
pub fn score_reason_step(result: &ScoringResult) -> ReasonStep {
    let scorer_label = if result.ai_used {
        "groq_llm"
    } else {
        "heuristic_fallback"
    };
    ReasonStep::new(
        layers::SCORER,
        scorer_label,
        result.decision_hint.as_str().to_uppercase(),
        format!(
            "score={:.3} | urgency={:.2} | engagement={:.2} | fatigue={:.2} | recency={:.2} | {}",
            result.score,
            result.urgency,
            result.engagement,
            result.fatigue_penalty,
            result.recency_bonus,
            result.reasoning
        ),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Channel;

    fn event(event_type: &str, hint: Option<PriorityHint>) -> NotificationEvent {
        NotificationEvent {
            user_id: "u1".into(),
            event_type: event_type.into(),
            title: "t".into(),
            message: "m".into(),
            source: "s".into(),
            channel: Channel::Push,
            priority_hint: hint,
            dedupe_key: None,
            expires_at: None,
            timestamp: None,
            metadata: serde_json::Map::new(),
        }
    }

    #[test]
    fn keyword_urgency_lookup() {
        assert_eq!(event_type_urgency("payment_failed"), 1.0);
        assert_eq!(event_type_urgency("SECURITY_ALERT"), 1.0);
        assert_eq!(event_type_urgency("weekly_newsletter"), 0.1);
        assert_eq!(event_type_urgency("promo_offer"), 0.2);
        assert_eq!(event_type_urgency("something_else"), UNKNOWN_URGENCY);
    }

    #[test]
    fn hint_raises_urgency_but_never_lowers_it() {
        let ctx = UserContext::new("u1");
        let scored = heuristic_score(
            &event("payment_failed", Some(PriorityHint::Low)),
            &ctx,
            3600,
            ScoreThresholds::default(),
            "heuristic_primary",
        );
        assert_eq!(scored.urgency, 1.0);

        let scored = heuristic_score(
            &event("something_else", Some(PriorityHint::Critical)),
            &ctx,
            3600,
            ScoreThresholds::default(),
            "heuristic_primary",
        );
        assert_eq!(scored.urgency, 1.0);
    }

    #[test]
    fn score_is_always_in_unit_interval() {
        let mut ctx = UserContext::new("u1");
        ctx.notifications_last_1h = 100;
        ctx.engagement_heatmap = vec![0.0; 24];
        ctx.seconds_since_last_same_type = Some(0.0);
        let scored = heuristic_score(
            &event("newsletter", None),
            &ctx,
            3600,
            ScoreThresholds::default(),
            "heuristic_primary",
        );
        assert!((0.0..=1.0).contains(&scored.score));

        let mut ctx = UserContext::new("u1");
        ctx.engagement_heatmap = vec![1.0; 24];
        let scored = heuristic_score(
            &event("security_alert", Some(PriorityHint::Critical)),
            &ctx,
            3600,
            ScoreThresholds::default(),
            "heuristic_primary",
        );
        assert!((0.0..=1.0).contains(&scored.score));
    }

    #[test]
    fn fresh_context_critical_event_scores_now() {
        // urgency 1.0, engagement 1.0, no fatigue, full recency:
        // 0.35 + 0.25 + 0.15 = 0.75, right at the NOW threshold.
        let ctx = UserContext::new("u1");
        let scored = heuristic_score(
            &event("payment_failed", Some(PriorityHint::Critical)),
            &ctx,
            3600,
            ScoreThresholds::default(),
            "heuristic_primary",
        );
        assert_eq!(scored.decision_hint, Decision::Now);
        assert!(!scored.ai_used);
        assert!(scored.fallback_used);
    }

    #[test]
    fn low_urgency_fatigued_event_scores_never() {
        let mut ctx = UserContext::new("u1");
        ctx.notifications_last_1h = 5;
        ctx.engagement_heatmap = vec![0.1; 24];
        ctx.seconds_since_last_same_type = Some(60.0);
        let scored = heuristic_score(
            &event("newsletter", None),
            &ctx,
            3600,
            ScoreThresholds::default(),
            "heuristic_primary",
        );
        assert_eq!(scored.decision_hint, Decision::Never);
    }

    #[test]
    fn threshold_hints() {
        let t = ScoreThresholds::default();
        assert_eq!(t.hint_for(0.8), Decision::Now);
        assert_eq!(t.hint_for(0.75), Decision::Now);
        assert_eq!(t.hint_for(0.5), Decision::Later);
        assert_eq!(t.hint_for(0.40), Decision::Later);
        assert_eq!(t.hint_for(0.39), Decision::Never);
    }

    #[test]
    fn reason_step_labels_fallback() {
        let ctx = UserContext::new("u1");
        let scored = heuristic_score(
            &event("reminder", None),
            &ctx,
            3600,
            ScoreThresholds::default(),
            "circuit_breaker_open",
        );
        let step = score_reason_step(&scored);
        assert_eq!(step.layer, "L4-AIScorer");
        assert_eq!(step.check, "heuristic_fallback");
        assert!(step.detail.unwrap().contains("circuit_breaker_open"));
    }
}
