//! Decision arbiter: merges rule verdicts, fatigue state, DND, and the
//! score into the final Now / Later / Never decision with a full reason
//! chain, and computes the optimal send time for deferred events.

use chrono::{Duration, DurationRound, Timelike};
use chrono_tz::Tz;

use crate::context::{is_dnd_active, UserContext};
use crate::event::NotificationEvent;
use crate::scoring::{ScoreThresholds, ScoringResult};
use crate::types::{layers, Decision, ReasonStep, Timestamp};

/// Deferred sends snap down to this boundary.
const SCHEDULE_GRANULARITY_MINUTES: i64 = 15;

/// Margin kept between a clamped schedule and the event's expiry.
const EXPIRY_MARGIN_MINUTES: i64 = 5;

/// Non-critical events above this score still bypass the hourly cap.
const CAP_BYPASS_SCORE: f64 = 0.8;

/// Final outcome of arbitration.
#[derive(Debug, Clone)]
pub struct ArbiterOutcome {
    pub decision: Decision,
    pub scheduled_at: Option<Timestamp>,
    pub reason_chain: Vec<ReasonStep>,
    pub override_note: Option<String>,
}

/// Find the best instant to deliver a deferred notification.
///
/// Scans the next 24 hourly offsets, skips hours inside the user's DND
/// window, and picks the one with the highest engagement heatmap value
/// (ties go to the earliest). Falls back to `now + 1h` when every hour is
/// in DND. The result is clamped to `expires_at - 5min` when an expiry is
/// set, and snapped down to a 15-minute boundary with zero seconds.
///
/// Hours are evaluated in the user's local timezone so the DND check and
/// the heatmap index agree.
pub fn compute_optimal_send_time(
    ctx: &UserContext,
    expires_at: Option<Timestamp>,
    now: Timestamp,
) -> Timestamp {
    let tz: Tz = ctx.timezone.parse().unwrap_or(Tz::UTC);
    let heatmap: &[f64] = if ctx.engagement_heatmap.len() == 24 {
        &ctx.engagement_heatmap
    } else {
        &[1.0; 24]
    };

    let mut best: Option<Timestamp> = None;
    let mut best_score = -1.0;

    for offset in 1..=24 {
        let candidate = now + Duration::hours(offset);
        let hour = candidate.with_timezone(&tz).hour();
        if is_dnd_active(ctx.dnd_start_hour, ctx.dnd_end_hour, hour) {
            continue;
        }
        let score = heatmap[hour as usize];
        if score > best_score {
            best_score = score;
            best = Some(candidate);
        }
    }

    let mut chosen = best.unwrap_or(now + Duration::hours(1));

    if let Some(expires) = expires_at {
        if chosen > expires {
            chosen = expires - Duration::minutes(EXPIRY_MARGIN_MINUTES);
        }
    }

    chosen
        .duration_trunc(Duration::minutes(SCHEDULE_GRANULARITY_MINUTES))
        .unwrap_or(chosen)
}

/// Merge everything into the final decision.
///
/// Precedence, first match wins:
/// 1. force-now rule, 2. force-never rule, 3. user topic opt-out,
/// 4. hourly cap (non-critical, score below the bypass), 5. daily cap
/// (non-critical), 6. DND (non-critical), 7. rule deferral, 8. score at or
/// above the NOW threshold or critical priority, 9. score at or above the
/// LATER threshold, 10. suppression.
#[allow(clippy::too_many_arguments)]
pub fn arbitrate(
    event: &NotificationEvent,
    rule_decision: Option<Decision>,
    rule_name: Option<&str>,
    scoring: &ScoringResult,
    ctx: &UserContext,
    dedup_steps: Vec<ReasonStep>,
    rule_steps: Vec<ReasonStep>,
    score_step: ReasonStep,
    thresholds: ScoreThresholds,
    now: Timestamp,
) -> ArbiterOutcome {
    let mut chain = dedup_steps;
    chain.extend(rule_steps);

    let rule_label = rule_name.unwrap_or("unnamed");

    // Step 1 + 2: hard rules win before anything else.
    if rule_decision == Some(Decision::Now) {
        chain.push(ReasonStep::new(
            layers::ARBITER,
            "rule_override",
            "NOW",
            format!("Hard force-now rule '{rule_label}' wins — immediate delivery"),
        ));
        return ArbiterOutcome {
            decision: Decision::Now,
            scheduled_at: None,
            reason_chain: chain,
            override_note: Some(format!("rule:{rule_label}")),
        };
    }
    if rule_decision == Some(Decision::Never) {
        chain.push(ReasonStep::new(
            layers::ARBITER,
            "rule_override",
            "NEVER",
            format!("Hard suppress rule '{rule_label}' wins — event suppressed"),
        ));
        return ArbiterOutcome {
            decision: Decision::Never,
            scheduled_at: None,
            reason_chain: chain,
            override_note: Some(format!("rule:{rule_label}")),
        };
    }

    // Step 3: topic opt-out.
    if ctx.opted_out_topics.contains(&event.event_type) {
        chain.push(ReasonStep::new(
            layers::ARBITER,
            "topic_opt_out",
            "NEVER",
            format!("User has opted out of '{}' notifications", event.event_type),
        ));
        return ArbiterOutcome {
            decision: Decision::Never,
            scheduled_at: None,
            reason_chain: chain,
            override_note: Some("user_opt_out".into()),
        };
    }

    chain.push(score_step);
    let score = scoring.score;
    let is_critical = event.is_critical();

    // Step 4: hourly cap. Very-high-score events still get through.
    if ctx.hourly_cap_hit() && !is_critical && score < CAP_BYPASS_SCORE {
        let scheduled_at = compute_optimal_send_time(ctx, event.expires_at, now);
        chain.push(ReasonStep::new(
            layers::ARBITER,
            "hourly_cap",
            "LATER",
            format!(
                "Hourly cap hit ({}/{}) — deferred to {}",
                ctx.notifications_last_1h,
                ctx.hourly_cap,
                scheduled_at.to_rfc3339()
            ),
        ));
        return ArbiterOutcome {
            decision: Decision::Later,
            scheduled_at: Some(scheduled_at),
            reason_chain: chain,
            override_note: Some("fatigue_hourly_cap".into()),
        };
    }

    // Step 5: daily cap.
    if ctx.daily_cap_hit() && !is_critical {
        chain.push(ReasonStep::new(
            layers::ARBITER,
            "daily_cap",
            "NEVER",
            format!(
                "Daily cap hit ({}/{}) — suppressed",
                ctx.notifications_last_24h, ctx.daily_cap
            ),
        ));
        return ArbiterOutcome {
            decision: Decision::Never,
            scheduled_at: None,
            reason_chain: chain,
            override_note: Some("fatigue_daily_cap".into()),
        };
    }

    // Step 6: DND window.
    if ctx.dnd_active && !is_critical {
        let scheduled_at = compute_optimal_send_time(ctx, event.expires_at, now);
        chain.push(ReasonStep::new(
            layers::ARBITER,
            "dnd_active",
            "LATER",
            format!(
                "DND active ({}–{}) — deferred to {}",
                ctx.dnd_start_hour,
                ctx.dnd_end_hour,
                scheduled_at.to_rfc3339()
            ),
        ));
        return ArbiterOutcome {
            decision: Decision::Later,
            scheduled_at: Some(scheduled_at),
            reason_chain: chain,
            override_note: Some("dnd_active".into()),
        };
    }

    // Step 7: rule-driven deferral.
    if rule_decision == Some(Decision::Later) {
        let scheduled_at = compute_optimal_send_time(ctx, event.expires_at, now);
        chain.push(ReasonStep::new(
            layers::ARBITER,
            "rule_defer",
            "LATER",
            format!(
                "Rule '{rule_label}' defers — scheduled for {}",
                scheduled_at.to_rfc3339()
            ),
        ));
        return ArbiterOutcome {
            decision: Decision::Later,
            scheduled_at: Some(scheduled_at),
            reason_chain: chain,
            override_note: Some(format!("rule:{rule_label}")),
        };
    }

    // Steps 8–10: score thresholds.
    if score >= thresholds.now || is_critical {
        chain.push(ReasonStep::new(
            layers::ARBITER,
            "score_threshold",
            "NOW",
            format!("Score {score:.3} >= threshold {} → send now", thresholds.now),
        ));
        ArbiterOutcome {
            decision: Decision::Now,
            scheduled_at: None,
            reason_chain: chain,
            override_note: None,
        }
    } else if score >= thresholds.later {
        let scheduled_at = compute_optimal_send_time(ctx, event.expires_at, now);
        chain.push(ReasonStep::new(
            layers::ARBITER,
            "score_threshold",
            "LATER",
            format!(
                "Score {score:.3} in [{}, {}) → deferred to {}",
                thresholds.later,
                thresholds.now,
                scheduled_at.to_rfc3339()
            ),
        ));
        ArbiterOutcome {
            decision: Decision::Later,
            scheduled_at: Some(scheduled_at),
            reason_chain: chain,
            override_note: None,
        }
    } else {
        chain.push(ReasonStep::new(
            layers::ARBITER,
            "score_threshold",
            "NEVER",
            format!(
                "Score {score:.3} < threshold {} → suppressed",
                thresholds.later
            ),
        ));
        ArbiterOutcome {
            decision: Decision::Never,
            scheduled_at: None,
            reason_chain: chain,
            override_note: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Channel, PriorityHint};
    use chrono::{TimeZone, Utc};

    fn event(hint: Option<PriorityHint>) -> NotificationEvent {
        NotificationEvent {
            user_id: "u1".into(),
            event_type: "payment_failed".into(),
            title: "Payment failed".into(),
            message: "Please retry your payment".into(),
            source: "billing".into(),
            channel: Channel::Push,
            priority_hint: hint,
            dedupe_key: None,
            expires_at: None,
            timestamp: None,
            metadata: serde_json::Map::new(),
        }
    }

    fn scoring(score: f64) -> ScoringResult {
        ScoringResult {
            score,
            decision_hint: ScoreThresholds::default().hint_for(score),
            urgency: 0.5,
            engagement: 0.5,
            fatigue_penalty: 0.0,
            recency_bonus: 1.0,
            reasoning: "test".into(),
            ai_used: false,
            fallback_used: true,
        }
    }

    fn score_step() -> ReasonStep {
        ReasonStep::new(layers::SCORER, "heuristic_fallback", "LATER", "test")
    }

    fn run(
        event: &NotificationEvent,
        rule_decision: Option<Decision>,
        score: f64,
        ctx: &UserContext,
    ) -> ArbiterOutcome {
        arbitrate(
            event,
            rule_decision,
            rule_decision.map(|_| "test rule"),
            &scoring(score),
            ctx,
            Vec::new(),
            Vec::new(),
            score_step(),
            ScoreThresholds::default(),
            Utc::now(),
        )
    }

    #[test]
    fn force_now_rule_wins_regardless_of_score() {
        let outcome = run(&event(None), Some(Decision::Now), 0.01, &UserContext::new("u1"));
        assert_eq!(outcome.decision, Decision::Now);
        assert!(outcome.scheduled_at.is_none());
        assert_eq!(outcome.override_note.as_deref(), Some("rule:test rule"));
    }

    #[test]
    fn force_never_rule_wins_regardless_of_score() {
        let outcome = run(&event(None), Some(Decision::Never), 0.99, &UserContext::new("u1"));
        assert_eq!(outcome.decision, Decision::Never);
        assert_eq!(outcome.override_note.as_deref(), Some("rule:test rule"));
    }

    #[test]
    fn opt_out_suppresses_before_scoring() {
        let mut ctx = UserContext::new("u1");
        ctx.opted_out_topics = vec!["payment_failed".into()];
        let outcome = run(&event(None), None, 0.99, &ctx);
        assert_eq!(outcome.decision, Decision::Never);
        assert_eq!(outcome.override_note.as_deref(), Some("user_opt_out"));
    }

    #[test]
    fn hourly_cap_defers_medium_score_events() {
        let mut ctx = UserContext::new("u1");
        ctx.notifications_last_1h = 5;
        let outcome = run(&event(None), None, 0.6, &ctx);
        assert_eq!(outcome.decision, Decision::Later);
        assert_eq!(outcome.override_note.as_deref(), Some("fatigue_hourly_cap"));
        let scheduled = outcome.scheduled_at.expect("deferred events are scheduled");
        assert_eq!(scheduled.minute() % 15, 0);
        assert_eq!(scheduled.second(), 0);
        assert!(outcome
            .reason_chain
            .iter()
            .any(|s| s.check == "hourly_cap"));
    }

    #[test]
    fn very_high_score_bypasses_hourly_cap() {
        let mut ctx = UserContext::new("u1");
        ctx.notifications_last_1h = 5;
        let outcome = run(&event(None), None, 0.85, &ctx);
        assert_eq!(outcome.decision, Decision::Now);
    }

    #[test]
    fn critical_bypasses_hourly_cap() {
        let mut ctx = UserContext::new("u1");
        ctx.notifications_last_1h = 5;
        let outcome = run(&event(Some(PriorityHint::Critical)), None, 0.2, &ctx);
        assert_eq!(outcome.decision, Decision::Now);
    }

    #[test]
    fn daily_cap_suppresses() {
        let mut ctx = UserContext::new("u1");
        ctx.notifications_last_24h = 20;
        let outcome = run(&event(None), None, 0.6, &ctx);
        assert_eq!(outcome.decision, Decision::Never);
        assert_eq!(outcome.override_note.as_deref(), Some("fatigue_daily_cap"));
    }

    #[test]
    fn dnd_defers_non_critical() {
        let mut ctx = UserContext::new("u1");
        ctx.dnd_active = true;
        let outcome = run(&event(None), None, 0.9, &ctx);
        assert_eq!(outcome.decision, Decision::Later);
        assert_eq!(outcome.override_note.as_deref(), Some("dnd_active"));
        assert!(outcome.scheduled_at.is_some());
    }

    #[test]
    fn critical_bypasses_dnd() {
        let mut ctx = UserContext::new("u1");
        ctx.dnd_active = true;
        let outcome = run(&event(Some(PriorityHint::Critical)), None, 0.9, &ctx);
        assert_eq!(outcome.decision, Decision::Now);
        assert!(outcome.scheduled_at.is_none());
    }

    #[test]
    fn rule_later_defers() {
        let outcome = run(&event(None), Some(Decision::Later), 0.9, &UserContext::new("u1"));
        assert_eq!(outcome.decision, Decision::Later);
        assert_eq!(outcome.override_note.as_deref(), Some("rule:test rule"));
    }

    #[test]
    fn score_thresholds_decide_the_rest() {
        let ctx = UserContext::new("u1");
        assert_eq!(run(&event(None), None, 0.80, &ctx).decision, Decision::Now);
        assert_eq!(run(&event(None), None, 0.50, &ctx).decision, Decision::Later);
        assert_eq!(run(&event(None), None, 0.10, &ctx).decision, Decision::Never);
    }

    #[test]
    fn low_score_critical_still_sends_now() {
        let ctx = UserContext::new("u1");
        let outcome = run(&event(Some(PriorityHint::Critical)), None, 0.1, &ctx);
        assert_eq!(outcome.decision, Decision::Now);
    }

    // -----------------------------------------------------------------------
    // Optimal send time
    // -----------------------------------------------------------------------

    #[test]
    fn send_time_snaps_to_quarter_hour() {
        let now = Utc.with_ymd_and_hms(2025, 6, 1, 9, 37, 42).unwrap();
        let ctx = UserContext::new("u1");
        let t = compute_optimal_send_time(&ctx, None, now);
        assert_eq!(t.minute() % 15, 0);
        assert_eq!(t.second(), 0);
    }

    #[test]
    fn send_time_avoids_dnd_hours() {
        let now = Utc.with_ymd_and_hms(2025, 6, 1, 21, 0, 0).unwrap();
        let mut ctx = UserContext::new("u1");
        ctx.dnd_start_hour = 22;
        ctx.dnd_end_hour = 8;
        let t = compute_optimal_send_time(&ctx, None, now);
        assert!(!is_dnd_active(22, 8, t.hour()));
    }

    #[test]
    fn send_time_prefers_highest_engagement_hour() {
        let now = Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap();
        let mut ctx = UserContext::new("u1");
        ctx.dnd_start_hour = 0;
        ctx.dnd_end_hour = 0; // empty window, no DND
        ctx.engagement_heatmap = vec![0.1; 24];
        ctx.engagement_heatmap[15] = 0.95;
        let t = compute_optimal_send_time(&ctx, None, now);
        assert_eq!(t.hour(), 15);
    }

    #[test]
    fn all_dnd_hours_fall_back_to_one_hour_out() {
        let now = Utc.with_ymd_and_hms(2025, 6, 1, 9, 2, 0).unwrap();
        let mut ctx = UserContext::new("u1");
        // Degenerate profile: DND covers the whole day.
        ctx.dnd_start_hour = 0;
        ctx.dnd_end_hour = 24;
        let t = compute_optimal_send_time(&ctx, None, now);
        assert_eq!(t, Utc.with_ymd_and_hms(2025, 6, 1, 10, 0, 0).unwrap());
    }

    #[test]
    fn send_time_clamped_before_expiry() {
        let now = Utc.with_ymd_and_hms(2025, 6, 1, 9, 0, 0).unwrap();
        let expires = now + Duration::minutes(90);
        let mut ctx = UserContext::new("u1");
        ctx.engagement_heatmap = vec![0.1; 24];
        ctx.engagement_heatmap[20] = 1.0; // best hour is past expiry
        let t = compute_optimal_send_time(&ctx, Some(expires), now);
        assert!(t <= expires - Duration::minutes(5));
        assert_eq!(t.minute() % 15, 0);
    }
}
