//! User profile models and DTOs.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use triage_core::types::Timestamp;

/// A row from the `user_profiles` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct UserProfile {
    pub user_id: String,
    pub timezone: String,
    pub dnd_start_hour: i32,
    pub dnd_end_hour: i32,
    pub channel_preferences: serde_json::Value,
    pub opted_out_topics: serde_json::Value,
    pub hourly_cap_override: Option<i32>,
    pub daily_cap_override: Option<i32>,
    pub segment: String,
    pub engagement_heatmap: serde_json::Value,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl UserProfile {
    /// Opted-out topics as a string list (tolerates malformed JSON).
    pub fn opted_out_topic_list(&self) -> Vec<String> {
        serde_json::from_value(self.opted_out_topics.clone()).unwrap_or_default()
    }

    /// Heatmap as a float vector; a proper 24-vector of `1.0` when the
    /// column is empty or malformed.
    pub fn heatmap_vec(&self) -> Vec<f64> {
        let parsed: Option<Vec<f64>> = serde_json::from_value(self.engagement_heatmap.clone()).ok();
        match parsed {
            Some(v) if v.len() == 24 => v,
            _ => vec![1.0; 24],
        }
    }
}

/// The profile fields the context enricher caches in the KV store
/// (`user:profile:{user_id}`, 300 s TTL).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileData {
    pub timezone: String,
    pub dnd_start_hour: u32,
    pub dnd_end_hour: u32,
    pub channel_preferences: serde_json::Value,
    pub opted_out_topics: Vec<String>,
    pub hourly_cap_override: Option<i64>,
    pub daily_cap_override: Option<i64>,
    pub segment: String,
    pub engagement_heatmap: Vec<f64>,
}

impl From<&UserProfile> for ProfileData {
    fn from(profile: &UserProfile) -> Self {
        Self {
            timezone: profile.timezone.clone(),
            dnd_start_hour: profile.dnd_start_hour.clamp(0, 23) as u32,
            dnd_end_hour: profile.dnd_end_hour.clamp(0, 24) as u32,
            channel_preferences: profile.channel_preferences.clone(),
            opted_out_topics: profile.opted_out_topic_list(),
            hourly_cap_override: profile.hourly_cap_override.map(i64::from),
            daily_cap_override: profile.daily_cap_override.map(i64::from),
            segment: profile.segment.clone(),
            engagement_heatmap: profile.heatmap_vec(),
        }
    }
}

/// DTO for `PATCH /v1/users/{id}/preferences`. Absent fields are untouched.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PreferenceUpdate {
    pub dnd_start_hour: Option<i32>,
    pub dnd_end_hour: Option<i32>,
    pub timezone: Option<String>,
    pub channel_preferences: Option<serde_json::Value>,
    pub opted_out_topics: Option<Vec<String>>,
    pub hourly_cap_override: Option<i32>,
    pub daily_cap_override: Option<i32>,
}

impl PreferenceUpdate {
    pub fn validate(&self) -> Result<(), triage_core::error::CoreError> {
        use triage_core::error::CoreError;
        for (field, value) in [
            ("dnd_start_hour", self.dnd_start_hour),
            ("dnd_end_hour", self.dnd_end_hour),
        ] {
            if let Some(hour) = value {
                if !(0..=23).contains(&hour) {
                    return Err(CoreError::Validation(format!(
                        "{field} must be between 0 and 23 (got {hour})"
                    )));
                }
            }
        }
        if let Some(cap) = self.hourly_cap_override {
            if !(1..=100).contains(&cap) {
                return Err(CoreError::Validation(
                    "hourly_cap_override must be between 1 and 100".into(),
                ));
            }
        }
        if let Some(cap) = self.daily_cap_override {
            if !(1..=500).contains(&cap) {
                return Err(CoreError::Validation(
                    "daily_cap_override must be between 1 and 500".into(),
                ));
            }
        }
        Ok(())
    }
}
