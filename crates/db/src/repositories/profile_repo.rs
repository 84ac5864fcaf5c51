//! Repository for the `user_profiles` table.

use sqlx::PgPool;

use crate::models::profile::UserProfile;

/// Column list for `user_profiles` queries.
const COLUMNS: &str = "user_id, timezone, dnd_start_hour, dnd_end_hour, channel_preferences, \
     opted_out_topics, hourly_cap_override, daily_cap_override, segment, engagement_heatmap, \
     created_at, updated_at";

/// Provides access to user notification profiles.
pub struct ProfileRepo;

impl ProfileRepo {
    pub async fn get(pool: &PgPool, user_id: &str) -> Result<Option<UserProfile>, sqlx::Error> {
        sqlx::query_as::<_, UserProfile>(&format!(
            "SELECT {COLUMNS} FROM user_profiles WHERE user_id = $1"
        ))
        .bind(user_id)
        .fetch_optional(pool)
        .await
    }

    /// Fetch a profile, creating a default row on first sight of the user.
    pub async fn get_or_create(pool: &PgPool, user_id: &str) -> Result<UserProfile, sqlx::Error> {
        let default_heatmap = serde_json::json!(vec![1.0f64; 24]);
        sqlx::query(
            "INSERT INTO user_profiles (user_id, engagement_heatmap) \
             VALUES ($1, $2) \
             ON CONFLICT (user_id) DO NOTHING",
        )
        .bind(user_id)
        .bind(&default_heatmap)
        .execute(pool)
        .await?;

        sqlx::query_as::<_, UserProfile>(&format!(
            "SELECT {COLUMNS} FROM user_profiles WHERE user_id = $1"
        ))
        .bind(user_id)
        .fetch_one(pool)
        .await
    }

    /// Write back every mutable profile field.
    pub async fn update(pool: &PgPool, profile: &UserProfile) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE user_profiles \
             SET timezone = $2, dnd_start_hour = $3, dnd_end_hour = $4, \
                 channel_preferences = $5, opted_out_topics = $6, hourly_cap_override = $7, \
                 daily_cap_override = $8, segment = $9, engagement_heatmap = $10, \
                 updated_at = NOW() \
             WHERE user_id = $1",
        )
        .bind(&profile.user_id)
        .bind(&profile.timezone)
        .bind(profile.dnd_start_hour)
        .bind(profile.dnd_end_hour)
        .bind(&profile.channel_preferences)
        .bind(&profile.opted_out_topics)
        .bind(profile.hourly_cap_override)
        .bind(profile.daily_cap_override)
        .bind(&profile.segment)
        .bind(&profile.engagement_heatmap)
        .execute(pool)
        .await?;
        Ok(())
    }
}
