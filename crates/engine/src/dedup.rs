//! Deduplication guard — three tiers, short-circuiting:
//!
//! 1. exact match via SHA-256 fingerprint,
//! 2. near-duplicate via MinHash signatures (Jaccard similarity),
//! 3. per-topic cooldown (same user + event type within the window).
//!
//! Every tier emits a reason step, even on PASS, so the audit chain always
//! shows what was checked. KV failures are soft: the affected tier passes
//! with a logged warning.

use std::sync::Arc;
use std::time::Duration;

use triage_core::event::NotificationEvent;
use triage_core::fingerprint::compute_fingerprint;
use triage_core::minhash;
use triage_core::types::{layers, ReasonStep};
use triage_kv::{keys, KvStore};

use crate::config::EngineConfig;

/// Near-duplicate detection is skipped below this message length.
const NEAR_DUP_MIN_MESSAGE_LEN: usize = 20;

/// Keys examined per signature scan page.
const LSH_SCAN_LIMIT: usize = 100;

/// Result of running the dedup tiers against one event.
#[derive(Debug)]
pub struct DedupOutcome {
    /// `None` when the event passed every tier.
    pub suppress_reason: Option<&'static str>,
    pub fingerprint: String,
    pub steps: Vec<ReasonStep>,
}

/// The three-tier dedup guard.
pub struct DedupGuard {
    kv: Arc<dyn KvStore>,
    config: Arc<EngineConfig>,
}

impl DedupGuard {
    pub fn new(kv: Arc<dyn KvStore>, config: Arc<EngineConfig>) -> Self {
        Self { kv, config }
    }

    /// Run all dedup checks, short-circuiting on the first suppression.
    pub async fn run(&self, event: &NotificationEvent) -> DedupOutcome {
        let fingerprint = compute_fingerprint(event);
        let mut steps = Vec::new();

        // Tier 1: exact duplicate.
        let (is_dup, step) = self.check_exact(&fingerprint).await;
        steps.push(step);
        if is_dup {
            return DedupOutcome {
                suppress_reason: Some("exact_duplicate"),
                fingerprint,
                steps,
            };
        }

        // Tier 2: near duplicate (skipped for very short messages).
        if event.message.len() > NEAR_DUP_MIN_MESSAGE_LEN {
            let (is_near, step) = self.check_near_duplicate(event, &fingerprint).await;
            steps.push(step);
            if is_near {
                return DedupOutcome {
                    suppress_reason: Some("near_duplicate"),
                    fingerprint,
                    steps,
                };
            }
        }

        // Tier 3: topic cooldown.
        let (is_cooling, step) = self.check_topic_cooldown(event).await;
        steps.push(step);
        if is_cooling {
            return DedupOutcome {
                suppress_reason: Some("topic_cooldown"),
                fingerprint,
                steps,
            };
        }

        DedupOutcome {
            suppress_reason: None,
            fingerprint,
            steps,
        }
    }

    /// Tier 1. The fingerprint is registered with a set-if-absent write so
    /// a concurrent twin observes this event's key.
    async fn check_exact(&self, fingerprint: &str) -> (bool, ReasonStep) {
        let key = keys::exact_dedup(fingerprint);
        let ttl = Duration::from_secs(self.config.exact_dedup_ttl_seconds);

        match self.kv.set_nx(&key, "1", ttl).await {
            Ok(true) => (
                false,
                ReasonStep::new(
                    layers::DEDUP,
                    "exact_duplicate",
                    "PASS",
                    "No exact duplicate found",
                ),
            ),
            Ok(false) => (
                true,
                ReasonStep::new(
                    layers::DEDUP,
                    "exact_duplicate",
                    "SUPPRESS",
                    format!("Fingerprint {}... seen within TTL window", &fingerprint[..12]),
                ),
            ),
            Err(e) => {
                tracing::warn!(error = %e, "Exact dedup check failed, failing open");
                (
                    false,
                    ReasonStep::new(
                        layers::DEDUP,
                        "exact_duplicate",
                        "PASS",
                        "KV unavailable — check skipped",
                    ),
                )
            }
        }
    }

    /// Tier 2. Compares this event's MinHash signature against the user's
    /// stored signatures, then registers it.
    async fn check_near_duplicate(
        &self,
        event: &NotificationEvent,
        fingerprint: &str,
    ) -> (bool, ReasonStep) {
        let text = format!("{} {}", event.title, event.message);
        let signature = minhash::signature(&text, self.config.lsh_num_perm);
        let threshold = self.config.lsh_jaccard_threshold;

        let scan = self
            .kv
            .scan_prefix(&keys::near_dedup_prefix(&event.user_id), LSH_SCAN_LIMIT)
            .await;

        let stored_keys = match scan {
            Ok(stored_keys) => stored_keys,
            Err(e) => {
                tracing::warn!(error = %e, "Near-dup signature scan failed, failing open");
                return (
                    false,
                    ReasonStep::new(
                        layers::DEDUP,
                        "near_duplicate_lsh",
                        "PASS",
                        "KV unavailable — check skipped",
                    ),
                );
            }
        };

        for key in stored_keys {
            let Ok(Some(raw)) = self.kv.get(&key).await else {
                continue;
            };
            let Ok(stored) = serde_json::from_str::<Vec<u64>>(&raw) else {
                continue;
            };
            let similarity = minhash::jaccard_estimate(&signature, &stored);
            if similarity >= threshold {
                return (
                    true,
                    ReasonStep::new(
                        layers::DEDUP,
                        "near_duplicate_lsh",
                        "SUPPRESS",
                        format!("Jaccard similarity {similarity:.2} >= threshold {threshold}"),
                    ),
                );
            }
        }

        // Register the new signature for future comparisons.
        let store_key = keys::near_dedup(&event.user_id, fingerprint);
        let encoded = serde_json::to_string(&signature).unwrap_or_default();
        if let Err(e) = self
            .kv
            .set(
                &store_key,
                &encoded,
                Duration::from_secs(self.config.near_dedup_ttl_seconds),
            )
            .await
        {
            tracing::warn!(error = %e, "Failed to store near-dup signature");
        }

        (
            false,
            ReasonStep::new(
                layers::DEDUP,
                "near_duplicate_lsh",
                "PASS",
                "No near-duplicate found above threshold",
            ),
        )
    }

    /// Tier 3. Critical priority bypasses the cooldown entirely.
    async fn check_topic_cooldown(&self, event: &NotificationEvent) -> (bool, ReasonStep) {
        if event.is_critical() {
            return (
                false,
                ReasonStep::new(
                    layers::DEDUP,
                    "topic_cooldown",
                    "BYPASS",
                    "Critical priority bypasses cooldown",
                ),
            );
        }

        let key = keys::cooldown(&event.user_id, &event.event_type);
        match self.kv.get(&key).await {
            Ok(Some(_)) => {
                let remaining = self
                    .kv
                    .ttl(&key)
                    .await
                    .ok()
                    .flatten()
                    .map(|d| d.as_secs())
                    .unwrap_or(0);
                (
                    true,
                    ReasonStep::new(
                        layers::DEDUP,
                        "topic_cooldown",
                        "DEFER",
                        format!(
                            "Topic {} in cooldown — {remaining}s remaining",
                            event.event_type
                        ),
                    ),
                )
            }
            Ok(None) => (
                false,
                ReasonStep::new(
                    layers::DEDUP,
                    "topic_cooldown",
                    "PASS",
                    "No active cooldown for this topic",
                ),
            ),
            Err(e) => {
                tracing::warn!(error = %e, "Cooldown check failed, failing open");
                (
                    false,
                    ReasonStep::new(
                        layers::DEDUP,
                        "topic_cooldown",
                        "PASS",
                        "KV unavailable — check skipped",
                    ),
                )
            }
        }
    }

}
