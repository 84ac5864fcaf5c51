//! Integration tests for the cached rules engine, run against seeded
//! snapshots (no database).

use serde_json::json;
use triage_core::condition::Conditions;
use triage_core::types::{Channel, Decision};
use triage_engine::rules::{ActiveRule, RulesEngine};
use uuid::Uuid;

fn rule(
    name: &str,
    rule_type: &str,
    conditions: serde_json::Value,
    action_params: serde_json::Value,
    priority_order: i32,
) -> ActiveRule {
    ActiveRule {
        id: Uuid::new_v4(),
        rule_name: name.into(),
        rule_type: rule_type.into(),
        conditions: serde_json::from_value::<Conditions>(conditions).unwrap(),
        action_params,
        priority_order,
    }
}

fn event(event_type: &str, channel: Channel) -> triage_core::event::NotificationEvent {
    triage_core::event::NotificationEvent {
        user_id: "user_1".into(),
        event_type: event_type.into(),
        title: "title".into(),
        message: "message body".into(),
        source: "svc".into(),
        channel,
        priority_hint: None,
        dedupe_key: None,
        expires_at: None,
        timestamp: None,
        metadata: serde_json::Map::new(),
    }
}

#[tokio::test]
async fn force_now_rule_fires() {
    let engine = RulesEngine::new();
    engine
        .seed(vec![rule(
            "Force critical payment alerts",
            "force_now",
            json!({"event_type": ["payment_failed", "payment_declined"]}),
            json!({}),
            1,
        )])
        .await;

    let verdict = engine.evaluate(&event("payment_failed", Channel::Push), None).await;
    assert_eq!(verdict.decision, Some(Decision::Now));
    assert_eq!(
        verdict.rule_name.as_deref(),
        Some("Force critical payment alerts")
    );
    assert_eq!(verdict.steps.len(), 1);
    assert_eq!(verdict.steps[0].result, "FORCE_NOW");
    assert_eq!(verdict.steps[0].layer, "L2-Rules");
}

#[tokio::test]
async fn promo_via_sms_blocked_by_channel_override() {
    let engine = RulesEngine::new();
    engine
        .seed(vec![rule(
            "Suppress all promotions via SMS",
            "channel_override",
            json!({"event_type": ["promo_offer", "promotion", "marketing", "discount", "newsletter"]}),
            json!({"allowed_channels": ["push", "email", "in_app"]}),
            10,
        )])
        .await;

    let verdict = engine.evaluate(&event("promo_offer", Channel::Sms), None).await;
    assert_eq!(verdict.decision, Some(Decision::Never));
    assert_eq!(
        verdict.rule_name.as_deref(),
        Some("Suppress all promotions via SMS")
    );
    assert_eq!(verdict.steps[0].result, "FORCE_NEVER");

    // The same promo over an allowed channel is not forced.
    let verdict = engine.evaluate(&event("promo_offer", Channel::Push), None).await;
    assert_eq!(verdict.decision, None);
    assert_eq!(verdict.steps[0].result, "MATCHED_NO_FORCE");
}

#[tokio::test]
async fn rules_run_in_priority_order() {
    let engine = RulesEngine::new();
    engine
        .seed(vec![
            rule(
                "late force_now",
                "force_now",
                json!({"event_type": "signup"}),
                json!({}),
                50,
            ),
            rule(
                "early force_never",
                "force_never",
                json!({"event_type": "signup"}),
                json!({}),
                5,
            ),
        ])
        .await;

    let verdict = engine.evaluate(&event("signup", Channel::Push), None).await;
    assert_eq!(verdict.decision, Some(Decision::Never));
    assert_eq!(verdict.rule_name.as_deref(), Some("early force_never"));
}

#[tokio::test]
async fn non_forcing_rule_types_are_informational() {
    let engine = RulesEngine::new();
    engine
        .seed(vec![
            rule(
                "cap marker",
                "cap",
                json!({"event_type": "reminder"}),
                json!({"max_per_hour": 2}),
                1,
            ),
            rule(
                "cooldown marker",
                "cooldown",
                json!({"event_type": "reminder"}),
                json!({}),
                2,
            ),
        ])
        .await;

    let verdict = engine.evaluate(&event("reminder", Channel::Push), None).await;
    assert_eq!(verdict.decision, None);
    assert!(verdict.rule_name.is_none());
    // Two MATCHED_NO_FORCE steps plus the trailing NO_MATCH summary.
    assert_eq!(verdict.steps.len(), 3);
    assert_eq!(verdict.steps[0].result, "MATCHED_NO_FORCE");
    assert_eq!(verdict.steps[1].result, "MATCHED_NO_FORCE");
    assert_eq!(verdict.steps[2].result, "NO_MATCH");
    assert!(verdict.steps[2]
        .detail
        .as_ref()
        .unwrap()
        .contains("Evaluated 2 rules"));
}

#[tokio::test]
async fn no_rules_yields_no_match() {
    let engine = RulesEngine::new();
    let verdict = engine.evaluate(&event("anything", Channel::Push), None).await;
    assert_eq!(verdict.decision, None);
    assert_eq!(verdict.steps.len(), 1);
    assert_eq!(verdict.steps[0].result, "NO_MATCH");
}

#[tokio::test]
async fn non_matching_rules_leave_no_steps() {
    let engine = RulesEngine::new();
    engine
        .seed(vec![rule(
            "payment only",
            "force_now",
            json!({"event_type": ["payment_failed"]}),
            json!({}),
            1,
        )])
        .await;

    let verdict = engine.evaluate(&event("newsletter", Channel::Email), None).await;
    assert_eq!(verdict.decision, None);
    assert_eq!(verdict.steps.len(), 1);
    assert_eq!(verdict.steps[0].result, "NO_MATCH");
}
