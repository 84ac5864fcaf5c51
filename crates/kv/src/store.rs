//! The KV store trait.

use std::time::Duration;

use async_trait::async_trait;

/// Error type for KV backends. The engine treats every KV failure as a
/// soft dependency error and fails open.
#[derive(Debug, thiserror::Error)]
pub enum KvError {
    #[error("KV backend error: {0}")]
    Backend(String),

    #[error("Value at '{key}' is not an integer")]
    NotAnInteger { key: String },
}

pub type KvResult<T> = Result<T, KvError>;

/// Minimal TTL-aware key/value interface.
///
/// Semantics follow the conventional Redis commands: `incr` is atomic,
/// `set_nx` only writes absent keys (and applies the TTL on that first
/// write, so a concurrent second writer observes the first's key), and
/// `expire_nx` pins a TTL only when none is set.
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Read a key, `None` when absent or expired.
    async fn get(&self, key: &str) -> KvResult<Option<String>>;

    /// Write a key with a TTL, replacing any existing value.
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> KvResult<()>;

    /// Write a key with a TTL only if it does not exist.
    /// Returns `true` when the write happened.
    async fn set_nx(&self, key: &str, value: &str, ttl: Duration) -> KvResult<bool>;

    /// Atomically increment an integer key (creating it at 1), returning
    /// the new value. Does not touch the TTL.
    async fn incr(&self, key: &str) -> KvResult<i64>;

    /// Set a TTL only if the key exists and has none yet.
    /// Returns `true` when the TTL was applied.
    async fn expire_nx(&self, key: &str, ttl: Duration) -> KvResult<bool>;

    /// Remaining TTL of a key, `None` when the key is absent or has no TTL.
    async fn ttl(&self, key: &str) -> KvResult<Option<Duration>>;

    /// Delete a key. Deleting an absent key is not an error.
    async fn delete(&self, key: &str) -> KvResult<()>;

    /// Up to `limit` live keys starting with `prefix` (one scan page).
    async fn scan_prefix(&self, prefix: &str, limit: usize) -> KvResult<Vec<String>>;
}
