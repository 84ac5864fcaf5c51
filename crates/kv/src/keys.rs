//! Key builders for the engine's KV layout.
//!
//! | Pattern | Purpose | TTL |
//! |---|---|---|
//! | `dedup:exact:{fingerprint}` | exact-duplicate marker | 3600 s |
//! | `dedup:lsh:{user_id}:{fingerprint}` | MinHash signature | 86400 s |
//! | `notif:count:{user_id}:1h` | hourly send counter | 3600 s |
//! | `notif:count:{user_id}:24h` | daily send counter | 86400 s |
//! | `notif:last:{user_id}:{event_type}` | last-send timestamp | 86400 s |
//! | `notif:cooldown:{user_id}:{event_type}` | per-topic cooldown | configurable |
//! | `user:profile:{user_id}` | profile read-through cache | 300 s |

pub fn exact_dedup(fingerprint: &str) -> String {
    format!("dedup:exact:{fingerprint}")
}

pub fn near_dedup(user_id: &str, fingerprint: &str) -> String {
    format!("dedup:lsh:{user_id}:{fingerprint}")
}

/// Prefix for scanning a user's stored MinHash signatures.
pub fn near_dedup_prefix(user_id: &str) -> String {
    format!("dedup:lsh:{user_id}:")
}

pub fn count_1h(user_id: &str) -> String {
    format!("notif:count:{user_id}:1h")
}

pub fn count_24h(user_id: &str) -> String {
    format!("notif:count:{user_id}:24h")
}

pub fn last_send(user_id: &str, event_type: &str) -> String {
    format!("notif:last:{user_id}:{event_type}")
}

pub fn cooldown(user_id: &str, event_type: &str) -> String {
    format!("notif:cooldown:{user_id}:{event_type}")
}

pub fn user_profile(user_id: &str) -> String {
    format!("user:profile:{user_id}")
}
