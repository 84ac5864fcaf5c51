//! Engine configuration loaded from environment variables.

use std::time::Duration;

use triage_core::scoring::ScoreThresholds;

/// Tunables for every pipeline stage.
///
/// All fields have defaults suitable for local development; override via
/// environment variables.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Redis DSN handed to a Redis-backed KV store adapter (the in-process
    /// store ignores it).
    pub redis_url: String,
    /// Kafka bootstrap servers handed to a Kafka-backed bus producer (the
    /// in-process bus ignores it).
    pub kafka_bootstrap_servers: String,

    // Groq LLM scoring
    pub groq_api_key: String,
    pub groq_model: String,
    pub groq_api_base: String,
    pub groq_timeout: Duration,

    // Decision thresholds
    pub ai_score_now_threshold: f64,
    pub ai_score_later_threshold: f64,

    // Fatigue defaults
    pub default_hourly_cap: i64,
    pub default_daily_cap: i64,
    pub default_cooldown_seconds: u64,

    // Dedup
    pub exact_dedup_ttl_seconds: u64,
    pub near_dedup_ttl_seconds: u64,
    pub lsh_jaccard_threshold: f64,
    pub lsh_num_perm: usize,

    // Scheduler
    pub scheduler_poll_interval_seconds: u64,
    pub digest_batch_window_minutes: i64,
}

impl EngineConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                          | Default                              |
    /// |----------------------------------|--------------------------------------|
    /// | `REDIS_URL`                      | `redis://localhost:6379/0`           |
    /// | `KAFKA_BOOTSTRAP_SERVERS`        | `localhost:9092`                     |
    /// | `GROQ_API_KEY`                   | (empty — heuristic scoring only)     |
    /// | `GROQ_MODEL`                     | `llama-3.1-8b-instant`               |
    /// | `GROQ_API_BASE`                  | `https://api.groq.com/openai/v1`     |
    /// | `GROQ_TIMEOUT_SECONDS`           | `1.5`                                |
    /// | `AI_SCORE_NOW_THRESHOLD`         | `0.75`                               |
    /// | `AI_SCORE_LATER_THRESHOLD`       | `0.40`                               |
    /// | `DEFAULT_HOURLY_CAP`             | `5`                                  |
    /// | `DEFAULT_DAILY_CAP`              | `20`                                 |
    /// | `DEFAULT_COOLDOWN_SECONDS`       | `3600`                               |
    /// | `EXACT_DEDUP_TTL_SECONDS`        | `3600`                               |
    /// | `NEAR_DEDUP_TTL_SECONDS`         | `86400`                              |
    /// | `LSH_JACCARD_THRESHOLD`          | `0.85`                               |
    /// | `LSH_NUM_PERM`                   | `128`                                |
    /// | `SCHEDULER_POLL_INTERVAL_SECONDS`| `30`                                 |
    /// | `DIGEST_BATCH_WINDOW_MINUTES`    | `30`                                 |
    pub fn from_env() -> Self {
        Self {
            redis_url: env_or("REDIS_URL", "redis://localhost:6379/0"),
            kafka_bootstrap_servers: env_or("KAFKA_BOOTSTRAP_SERVERS", "localhost:9092"),
            groq_api_key: env_or("GROQ_API_KEY", ""),
            groq_model: env_or("GROQ_MODEL", "llama-3.1-8b-instant"),
            groq_api_base: env_or("GROQ_API_BASE", "https://api.groq.com/openai/v1"),
            groq_timeout: Duration::from_secs_f64(env_parse("GROQ_TIMEOUT_SECONDS", 1.5)),
            ai_score_now_threshold: env_parse("AI_SCORE_NOW_THRESHOLD", 0.75),
            ai_score_later_threshold: env_parse("AI_SCORE_LATER_THRESHOLD", 0.40),
            default_hourly_cap: env_parse("DEFAULT_HOURLY_CAP", 5),
            default_daily_cap: env_parse("DEFAULT_DAILY_CAP", 20),
            default_cooldown_seconds: env_parse("DEFAULT_COOLDOWN_SECONDS", 3600),
            exact_dedup_ttl_seconds: env_parse("EXACT_DEDUP_TTL_SECONDS", 3600),
            near_dedup_ttl_seconds: env_parse("NEAR_DEDUP_TTL_SECONDS", 86400),
            lsh_jaccard_threshold: env_parse("LSH_JACCARD_THRESHOLD", 0.85),
            lsh_num_perm: env_parse("LSH_NUM_PERM", 128),
            scheduler_poll_interval_seconds: env_parse("SCHEDULER_POLL_INTERVAL_SECONDS", 30),
            digest_batch_window_minutes: env_parse("DIGEST_BATCH_WINDOW_MINUTES", 30),
        }
    }

    /// The decision thresholds as the core's compact type.
    pub fn score_thresholds(&self) -> ScoreThresholds {
        ScoreThresholds {
            now: self.ai_score_now_threshold,
            later: self.ai_score_later_threshold,
        }
    }
}

impl Default for EngineConfig {
    /// The documented defaults, independent of the process environment.
    fn default() -> Self {
        Self {
            redis_url: "redis://localhost:6379/0".into(),
            kafka_bootstrap_servers: "localhost:9092".into(),
            groq_api_key: String::new(),
            groq_model: "llama-3.1-8b-instant".into(),
            groq_api_base: "https://api.groq.com/openai/v1".into(),
            groq_timeout: Duration::from_secs_f64(1.5),
            ai_score_now_threshold: 0.75,
            ai_score_later_threshold: 0.40,
            default_hourly_cap: 5,
            default_daily_cap: 20,
            default_cooldown_seconds: 3600,
            exact_dedup_ttl_seconds: 3600,
            near_dedup_ttl_seconds: 86400,
            lsh_jaccard_threshold: 0.85,
            lsh_num_perm: 128,
            scheduler_poll_interval_seconds: 30,
            digest_batch_window_minutes: 30,
        }
    }
}

fn env_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T: std::str::FromStr + Copy>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
