//! Per-user evaluation context and its derived signals.

use serde_json::Value;

/// Default hourly send cap when the profile has no override.
pub const DEFAULT_HOURLY_CAP: i64 = 5;

/// Default daily send cap when the profile has no override.
pub const DEFAULT_DAILY_CAP: i64 = 20;

/// Engagement score assumed when the heatmap is missing or malformed.
pub const DEFAULT_ENGAGEMENT: f64 = 0.5;

/// Everything the scorer and arbiter need to know about one user at
/// evaluation time. Built by the context enricher; every field has a safe
/// default so a failed fetch degrades rather than errors.
#[derive(Debug, Clone)]
pub struct UserContext {
    pub user_id: String,
    // Fatigue counters
    pub notifications_last_1h: i64,
    pub notifications_last_24h: i64,
    // Caps
    pub hourly_cap: i64,
    pub daily_cap: i64,
    // Time context
    pub dnd_active: bool,
    pub dnd_start_hour: u32,
    pub dnd_end_hour: u32,
    pub timezone: String,
    pub current_local_hour: u32,
    // Preferences
    pub opted_out_topics: Vec<String>,
    pub channel_preferences: Value,
    pub segment: String,
    // Recency
    pub seconds_since_last_same_type: Option<f64>,
    // Engagement: 24 values, one per local hour
    pub engagement_heatmap: Vec<f64>,
    // Flags
    pub profile_found: bool,
}

impl UserContext {
    /// Fresh context with safe defaults for the given user.
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            notifications_last_1h: 0,
            notifications_last_24h: 0,
            hourly_cap: DEFAULT_HOURLY_CAP,
            daily_cap: DEFAULT_DAILY_CAP,
            dnd_active: false,
            dnd_start_hour: 22,
            dnd_end_hour: 8,
            timezone: "UTC".into(),
            current_local_hour: 12,
            opted_out_topics: Vec::new(),
            channel_preferences: Value::Object(Default::default()),
            segment: "standard".into(),
            seconds_since_last_same_type: None,
            engagement_heatmap: vec![1.0; 24],
            profile_found: false,
        }
    }

    pub fn hourly_cap_hit(&self) -> bool {
        self.notifications_last_1h >= self.hourly_cap
    }

    pub fn daily_cap_hit(&self) -> bool {
        self.notifications_last_24h >= self.daily_cap
    }

    /// Fraction of the hourly cap already consumed, clamped to 1.0.
    pub fn fatigue_ratio_1h(&self) -> f64 {
        if self.hourly_cap == 0 {
            return 1.0;
        }
        (self.notifications_last_1h as f64 / self.hourly_cap as f64).min(1.0)
    }

    /// Heatmap value for the current local hour, or [`DEFAULT_ENGAGEMENT`]
    /// when the heatmap is not a proper 24-vector.
    pub fn engagement_score_for_current_hour(&self) -> f64 {
        if self.engagement_heatmap.len() == 24 {
            self.engagement_heatmap[self.current_local_hour as usize % 24]
        } else {
            DEFAULT_ENGAGEMENT
        }
    }

    /// 0.0 (just sent) → 1.0 (long ago, or never sent this topic).
    pub fn recency_bonus(&self, default_cooldown_seconds: u64) -> f64 {
        match self.seconds_since_last_same_type {
            None => 1.0,
            Some(seconds) => (seconds / default_cooldown_seconds as f64).min(1.0),
        }
    }
}

/// Whether `current_hour` falls inside the `[start, end)` DND window.
/// `start > end` means an overnight window (e.g. 22 → 8).
pub fn is_dnd_active(start: u32, end: u32, current_hour: u32) -> bool {
    if start > end {
        current_hour >= start || current_hour < end
    } else {
        start <= current_hour && current_hour < end
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overnight_dnd_window() {
        for hour in [22, 23, 0, 1, 5, 7] {
            assert!(is_dnd_active(22, 8, hour), "hour {hour} should be DND");
        }
        for hour in 8..22 {
            assert!(!is_dnd_active(22, 8, hour), "hour {hour} should not be DND");
        }
    }

    #[test]
    fn daytime_dnd_window() {
        assert!(is_dnd_active(9, 17, 9));
        assert!(is_dnd_active(9, 17, 16));
        assert!(!is_dnd_active(9, 17, 17));
        assert!(!is_dnd_active(9, 17, 8));
    }

    #[test]
    fn fatigue_ratio_clamps_to_one() {
        let mut ctx = UserContext::new("u1");
        ctx.notifications_last_1h = 12;
        ctx.hourly_cap = 5;
        assert_eq!(ctx.fatigue_ratio_1h(), 1.0);
        ctx.notifications_last_1h = 2;
        assert_eq!(ctx.fatigue_ratio_1h(), 0.4);
    }

    #[test]
    fn zero_cap_means_fully_fatigued() {
        let mut ctx = UserContext::new("u1");
        ctx.hourly_cap = 0;
        assert_eq!(ctx.fatigue_ratio_1h(), 1.0);
    }

    #[test]
    fn cap_hit_checks() {
        let mut ctx = UserContext::new("u1");
        ctx.notifications_last_1h = 5;
        assert!(ctx.hourly_cap_hit());
        ctx.notifications_last_24h = 19;
        assert!(!ctx.daily_cap_hit());
        ctx.notifications_last_24h = 20;
        assert!(ctx.daily_cap_hit());
    }

    #[test]
    fn engagement_defaults_when_heatmap_malformed() {
        let mut ctx = UserContext::new("u1");
        ctx.engagement_heatmap = vec![0.9; 12];
        assert_eq!(ctx.engagement_score_for_current_hour(), DEFAULT_ENGAGEMENT);
    }

    #[test]
    fn engagement_reads_current_local_hour() {
        let mut ctx = UserContext::new("u1");
        ctx.engagement_heatmap = (0..24).map(|h| h as f64 / 24.0).collect();
        ctx.current_local_hour = 6;
        assert_eq!(ctx.engagement_score_for_current_hour(), 6.0 / 24.0);
    }

    #[test]
    fn recency_bonus_scaling() {
        let mut ctx = UserContext::new("u1");
        assert_eq!(ctx.recency_bonus(3600), 1.0);
        ctx.seconds_since_last_same_type = Some(1800.0);
        assert_eq!(ctx.recency_bonus(3600), 0.5);
        ctx.seconds_since_last_same_type = Some(7200.0);
        assert_eq!(ctx.recency_bonus(3600), 1.0);
        ctx.seconds_since_last_same_type = Some(0.0);
        assert_eq!(ctx.recency_bonus(3600), 0.0);
    }
}
