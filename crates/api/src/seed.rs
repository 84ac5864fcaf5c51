//! Default rule seeding.
//!
//! On first boot (empty `rule_configs` table) a small set of sensible
//! operator rules is installed so the engine is useful out of the box.

use chrono::Utc;
use serde_json::json;
use triage_core::rules::{RULE_CHANNEL_OVERRIDE, RULE_FORCE_NOW, RULE_QUIET_HOURS};
use triage_db::models::rule::Rule;
use triage_db::repositories::RuleRepo;
use triage_db::DbPool;
use uuid::Uuid;

/// Insert the default rules when the table is empty.
pub async fn seed_default_rules(pool: &DbPool) -> Result<(), sqlx::Error> {
    if RuleRepo::count(pool).await? > 0 {
        return Ok(());
    }

    let defaults = [
        (
            "Force critical payment alerts",
            RULE_FORCE_NOW,
            json!({"event_type": ["payment_failed", "payment_declined", "payment_error"]}),
            json!({}),
            1,
        ),
        (
            "Force security and auth alerts",
            RULE_FORCE_NOW,
            json!({"event_type": ["security_alert", "login_attempt", "otp", "2fa", "password_reset"]}),
            json!({}),
            2,
        ),
        (
            "Suppress all promotions via SMS",
            RULE_CHANNEL_OVERRIDE,
            json!({"event_type": ["promo_offer", "promotion", "marketing", "discount", "newsletter"]}),
            json!({"allowed_channels": ["push", "email", "in_app"]}),
            10,
        ),
        (
            "Global quiet hours 22-08 UTC",
            RULE_QUIET_HOURS,
            // Empty conditions: applies to every event.
            json!({}),
            json!({"start_hour": 22, "end_hour": 8}),
            20,
        ),
    ];

    let now = Utc::now();
    for (rule_name, rule_type, conditions, action_params, priority_order) in defaults {
        let rule = Rule {
            id: Uuid::new_v4(),
            rule_name: rule_name.to_string(),
            rule_type: rule_type.to_string(),
            conditions,
            action_params,
            priority_order,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        RuleRepo::create(pool, &rule).await?;
    }

    tracing::info!(count = 4, "Default rules seeded");
    Ok(())
}
