//! Context enricher — gathers all per-user state needed for scoring.
//!
//! Counters, the last-send timestamp, and the profile are fetched in
//! parallel and joined. Never fails: any subsystem failure leaves the
//! affected field at its safe default.

use std::sync::Arc;
use std::time::Duration;

use chrono::{Timelike, Utc};
use chrono_tz::Tz;
use sqlx::PgPool;
use triage_core::context::UserContext;
use triage_core::event::NotificationEvent;
use triage_db::models::profile::ProfileData;
use triage_db::repositories::ProfileRepo;
use triage_kv::{keys, KvStore};

use crate::config::EngineConfig;

/// TTL for the profile read-through cache.
const PROFILE_CACHE_TTL: Duration = Duration::from_secs(300);

/// Builds a [`UserContext`] per event.
pub struct ContextEnricher {
    kv: Arc<dyn KvStore>,
    config: Arc<EngineConfig>,
}

impl ContextEnricher {
    pub fn new(kv: Arc<dyn KvStore>, config: Arc<EngineConfig>) -> Self {
        Self { kv, config }
    }

    /// Build the full user context. Never raises; safe defaults apply
    /// wherever a fetch fails.
    pub async fn enrich(&self, event: &NotificationEvent, pool: Option<&PgPool>) -> UserContext {
        let mut ctx = UserContext::new(&event.user_id);
        ctx.hourly_cap = self.config.default_hourly_cap;
        ctx.daily_cap = self.config.default_daily_cap;

        let (counters, last_send, profile) = tokio::join!(
            self.fetch_counters(&event.user_id),
            self.fetch_last_send(&event.user_id, &event.event_type),
            self.fetch_profile(&event.user_id, pool),
        );

        let (count_1h, count_24h) = counters;
        ctx.notifications_last_1h = count_1h;
        ctx.notifications_last_24h = count_24h;
        ctx.seconds_since_last_same_type = last_send;

        if let Some(profile) = profile {
            ctx.profile_found = true;
            ctx.timezone = profile.timezone;
            ctx.dnd_start_hour = profile.dnd_start_hour;
            ctx.dnd_end_hour = profile.dnd_end_hour;
            ctx.channel_preferences = profile.channel_preferences;
            ctx.opted_out_topics = profile.opted_out_topics;
            ctx.segment = profile.segment;
            ctx.engagement_heatmap = profile.engagement_heatmap;
            if let Some(cap) = profile.hourly_cap_override {
                ctx.hourly_cap = cap;
            }
            if let Some(cap) = profile.daily_cap_override {
                ctx.daily_cap = cap;
            }
        }

        ctx.current_local_hour = current_local_hour(&ctx.timezone);
        ctx.dnd_active = triage_core::context::is_dnd_active(
            ctx.dnd_start_hour,
            ctx.dnd_end_hour,
            ctx.current_local_hour,
        );

        tracing::debug!(
            user_id = %ctx.user_id,
            count_1h = ctx.notifications_last_1h,
            dnd_active = ctx.dnd_active,
            profile_found = ctx.profile_found,
            "Context enriched"
        );
        ctx
    }

    /// `(count_1h, count_24h)` from the KV counters; zeros on failure.
    async fn fetch_counters(&self, user_id: &str) -> (i64, i64) {
        let read = |key: String| {
            let kv = Arc::clone(&self.kv);
            async move {
                match kv.get(&key).await {
                    Ok(value) => value.and_then(|v| v.parse::<i64>().ok()).unwrap_or(0),
                    Err(e) => {
                        tracing::warn!(error = %e, "Counter read failed, assuming zero");
                        0
                    }
                }
            }
        };
        tokio::join!(read(keys::count_1h(user_id)), read(keys::count_24h(user_id)))
    }

    /// Seconds since the last send of this event type, or `None`.
    async fn fetch_last_send(&self, user_id: &str, event_type: &str) -> Option<f64> {
        let key = keys::last_send(user_id, event_type);
        match self.kv.get(&key).await {
            Ok(Some(raw)) => {
                let last_ts: f64 = raw.parse().ok()?;
                let now_ts = Utc::now().timestamp() as f64;
                Some((now_ts - last_ts).max(0.0))
            }
            Ok(None) => None,
            Err(_) => None,
        }
    }

    /// Profile read-through: KV cache first, then the durable store, and
    /// a cache write-back on a miss.
    async fn fetch_profile(&self, user_id: &str, pool: Option<&PgPool>) -> Option<ProfileData> {
        let cache_key = keys::user_profile(user_id);

        if let Ok(Some(cached)) = self.kv.get(&cache_key).await {
            if let Ok(profile) = serde_json::from_str::<ProfileData>(&cached) {
                return Some(profile);
            }
        }

        let pool = pool?;
        match ProfileRepo::get(pool, user_id).await {
            Ok(Some(row)) => {
                let profile = ProfileData::from(&row);
                if let Ok(encoded) = serde_json::to_string(&profile) {
                    if let Err(e) = self.kv.set(&cache_key, &encoded, PROFILE_CACHE_TTL).await {
                        tracing::warn!(error = %e, "Profile cache write failed");
                    }
                }
                Some(profile)
            }
            Ok(None) => None,
            Err(e) => {
                tracing::warn!(error = %e, "Profile fetch failed, using defaults");
                None
            }
        }
    }
}

/// Current hour in the given IANA timezone, UTC on lookup failure.
pub fn current_local_hour(timezone: &str) -> u32 {
    match timezone.parse::<Tz>() {
        Ok(tz) => Utc::now().with_timezone(&tz).hour(),
        Err(_) => Utc::now().hour(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_timezone_falls_back_to_utc() {
        assert_eq!(current_local_hour("Not/AZone"), Utc::now().hour());
        assert_eq!(current_local_hour("UTC"), Utc::now().hour());
    }

    #[test]
    fn known_timezone_shifts_the_hour() {
        // Kathmandu is UTC+5:45 year-round; the hour differs from UTC except
        // briefly around the 15-minute offsets.
        let local = current_local_hour("Asia/Kathmandu");
        assert!(local < 24);
    }
}
