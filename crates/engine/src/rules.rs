//! Rules engine with an in-process cached snapshot.
//!
//! Active rules live in Postgres and are cached here with a short TTL so
//! operator edits take effect within seconds without a deployment. Readers
//! always see either the old snapshot or the new one; the swap is atomic
//! behind an `RwLock`. CRUD handlers call [`RulesEngine::invalidate`] to
//! force a reload on the next evaluation.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{Timelike, Utc};
use sqlx::PgPool;
use tokio::sync::RwLock;
use triage_core::condition::Conditions;
use triage_core::event::NotificationEvent;
use triage_core::rules::{
    RULE_CHANNEL_OVERRIDE, RULE_FORCE_NEVER, RULE_FORCE_NOW, RULE_QUIET_HOURS,
};
use triage_core::types::{layers, Decision, ReasonStep};
use triage_db::repositories::RuleRepo;
use uuid::Uuid;

/// How long a loaded snapshot stays fresh.
const CACHE_TTL: Duration = Duration::from_secs(30);

/// A parsed, active rule ready for matching.
#[derive(Debug, Clone)]
pub struct ActiveRule {
    pub id: Uuid,
    pub rule_name: String,
    pub rule_type: String,
    pub conditions: Conditions,
    pub action_params: serde_json::Value,
    pub priority_order: i32,
}

/// What the rules stage hands to the arbiter.
#[derive(Debug)]
pub struct RuleVerdict {
    /// `Some` when a rule forced an outcome.
    pub decision: Option<Decision>,
    pub rule_name: Option<String>,
    pub steps: Vec<ReasonStep>,
}

#[derive(Debug)]
struct Snapshot {
    rules: Arc<Vec<ActiveRule>>,
    loaded_at: Option<Instant>,
}

/// Cached rule evaluator.
pub struct RulesEngine {
    cache: RwLock<Snapshot>,
    ttl: Duration,
}

impl Default for RulesEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl RulesEngine {
    pub fn new() -> Self {
        Self::with_ttl(CACHE_TTL)
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            cache: RwLock::new(Snapshot {
                rules: Arc::new(Vec::new()),
                loaded_at: None,
            }),
            ttl,
        }
    }

    /// Force a reload on the next read. Called after every rule mutation.
    pub async fn invalidate(&self) {
        let mut cache = self.cache.write().await;
        cache.loaded_at = None;
        tracing::info!("Rules cache invalidated");
    }

    /// Replace the snapshot directly and mark it fresh. Used by tests and
    /// tooling that evaluate without a database.
    pub async fn seed(&self, mut rules: Vec<ActiveRule>) {
        rules.sort_by_key(|r| (r.priority_order, r.rule_name.clone()));
        let mut cache = self.cache.write().await;
        cache.rules = Arc::new(rules);
        cache.loaded_at = Some(Instant::now());
    }

    /// The current snapshot, refreshed from the database when stale.
    /// A failed reload keeps serving the previous snapshot.
    async fn active_rules(&self, pool: Option<&PgPool>) -> Arc<Vec<ActiveRule>> {
        {
            let cache = self.cache.read().await;
            let fresh = cache
                .loaded_at
                .is_some_and(|loaded_at| loaded_at.elapsed() <= self.ttl);
            if fresh || pool.is_none() {
                return Arc::clone(&cache.rules);
            }
        }

        let Some(pool) = pool else {
            let cache = self.cache.read().await;
            return Arc::clone(&cache.rules);
        };
        match RuleRepo::list(pool, true).await {
            Ok(rows) => {
                let rules: Vec<ActiveRule> = rows
                    .into_iter()
                    .filter_map(|row| {
                        match serde_json::from_value::<Conditions>(row.conditions.clone()) {
                            Ok(conditions) => Some(ActiveRule {
                                id: row.id,
                                rule_name: row.rule_name,
                                rule_type: row.rule_type,
                                conditions,
                                action_params: row.action_params,
                                priority_order: row.priority_order,
                            }),
                            Err(e) => {
                                tracing::warn!(
                                    rule_name = %row.rule_name,
                                    error = %e,
                                    "Skipping rule with unparseable conditions"
                                );
                                None
                            }
                        }
                    })
                    .collect();
                let mut cache = self.cache.write().await;
                cache.rules = Arc::new(rules);
                cache.loaded_at = Some(Instant::now());
                tracing::info!(count = cache.rules.len(), "Rules cache refreshed");
                Arc::clone(&cache.rules)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Rules reload failed, serving stale snapshot");
                let cache = self.cache.read().await;
                Arc::clone(&cache.rules)
            }
        }
    }

    /// Evaluate all active rules against the event in ascending priority
    /// order, returning the first forced outcome.
    pub async fn evaluate(&self, event: &NotificationEvent, pool: Option<&PgPool>) -> RuleVerdict {
        let rules = self.active_rules(pool).await;
        let mut steps = Vec::new();

        for rule in rules.iter() {
            if !rule.conditions.matches(event) {
                continue;
            }

            match rule.rule_type.as_str() {
                RULE_FORCE_NOW => {
                    steps.push(ReasonStep::new(
                        layers::RULES,
                        format!("rule:{}", rule.rule_name),
                        "FORCE_NOW",
                        format!("Rule '{}' forces immediate delivery", rule.rule_name),
                    ));
                    return RuleVerdict {
                        decision: Some(Decision::Now),
                        rule_name: Some(rule.rule_name.clone()),
                        steps,
                    };
                }
                RULE_FORCE_NEVER => {
                    steps.push(ReasonStep::new(
                        layers::RULES,
                        format!("rule:{}", rule.rule_name),
                        "FORCE_NEVER",
                        format!("Rule '{}' suppresses this notification", rule.rule_name),
                    ));
                    return RuleVerdict {
                        decision: Some(Decision::Never),
                        rule_name: Some(rule.rule_name.clone()),
                        steps,
                    };
                }
                RULE_QUIET_HOURS => {
                    let (start, end) = quiet_hours_window(&rule.action_params);
                    if quiet_hours_active(start, end, Utc::now().hour()) {
                        steps.push(ReasonStep::new(
                            layers::RULES,
                            format!("rule:{}", rule.rule_name),
                            "DEFER",
                            format!("Quiet hours active ({start}\u{2013}{end} UTC)"),
                        ));
                        return RuleVerdict {
                            decision: Some(Decision::Later),
                            rule_name: Some(rule.rule_name.clone()),
                            steps,
                        };
                    }
                }
                RULE_CHANNEL_OVERRIDE => {
                    let allowed = allowed_channels(&rule.action_params);
                    if !allowed.iter().any(|c| c == event.channel.as_str()) {
                        steps.push(ReasonStep::new(
                            layers::RULES,
                            format!("rule:{}", rule.rule_name),
                            "FORCE_NEVER",
                            format!(
                                "Channel '{}' not in allowed: {allowed:?}",
                                event.channel.as_str()
                            ),
                        ));
                        return RuleVerdict {
                            decision: Some(Decision::Never),
                            rule_name: Some(rule.rule_name.clone()),
                            steps,
                        };
                    }
                }
                // cooldown / cap rule types are declared but non-forcing.
                _ => {}
            }

            steps.push(ReasonStep::new(
                layers::RULES,
                format!("rule:{}", rule.rule_name),
                "MATCHED_NO_FORCE",
                format!("Rule '{}' matched but did not force decision", rule.rule_name),
            ));
        }

        steps.push(ReasonStep::new(
            layers::RULES,
            "rules_evaluation",
            "NO_MATCH",
            format!("Evaluated {} rules — no hard outcome", rules.len()),
        ));
        RuleVerdict {
            decision: None,
            rule_name: None,
            steps,
        }
    }
}

/// `(start_hour, end_hour)` from quiet-hours action params, defaulting to
/// the conventional 22 → 8 overnight window.
fn quiet_hours_window(action_params: &serde_json::Value) -> (u32, u32) {
    let get = |key: &str, default: u32| {
        action_params
            .get(key)
            .and_then(|v| v.as_u64())
            .map(|v| v as u32)
            .unwrap_or(default)
    };
    (get("start_hour", 22), get("end_hour", 8))
}

/// Whether `hour` falls in the `[start, end)` window (overnight if
/// `start > end`).
pub fn quiet_hours_active(start: u32, end: u32, hour: u32) -> bool {
    if start > end {
        hour >= start || hour < end
    } else {
        start <= hour && hour < end
    }
}

fn allowed_channels(action_params: &serde_json::Value) -> Vec<String> {
    action_params
        .get("allowed_channels")
        .and_then(|v| serde_json::from_value::<Vec<String>>(v.clone()).ok())
        .unwrap_or_default()
}
