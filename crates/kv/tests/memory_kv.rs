//! Behavioural tests for the in-memory KV store.

use std::time::Duration;

use triage_kv::{KvStore, MemoryKv};

const LONG: Duration = Duration::from_secs(60);

#[tokio::test]
async fn set_and_get_round_trip() {
    let kv = MemoryKv::new();
    kv.set("k", "v", LONG).await.unwrap();
    assert_eq!(kv.get("k").await.unwrap().as_deref(), Some("v"));
    assert_eq!(kv.get("missing").await.unwrap(), None);
}

#[tokio::test]
async fn expired_keys_read_as_absent() {
    let kv = MemoryKv::new();
    kv.set("k", "v", Duration::from_millis(20)).await.unwrap();
    tokio::time::sleep(Duration::from_millis(40)).await;
    assert_eq!(kv.get("k").await.unwrap(), None);
    assert!(kv.is_empty().await);
}

#[tokio::test]
async fn set_nx_only_writes_absent_keys() {
    let kv = MemoryKv::new();
    assert!(kv.set_nx("fp", "1", LONG).await.unwrap());
    assert!(!kv.set_nx("fp", "2", LONG).await.unwrap());
    assert_eq!(kv.get("fp").await.unwrap().as_deref(), Some("1"));
}

#[tokio::test]
async fn set_nx_succeeds_after_expiry() {
    let kv = MemoryKv::new();
    assert!(kv.set_nx("fp", "1", Duration::from_millis(20)).await.unwrap());
    tokio::time::sleep(Duration::from_millis(40)).await;
    assert!(kv.set_nx("fp", "2", LONG).await.unwrap());
}

#[tokio::test]
async fn incr_counts_from_zero() {
    let kv = MemoryKv::new();
    assert_eq!(kv.incr("count").await.unwrap(), 1);
    assert_eq!(kv.incr("count").await.unwrap(), 2);
    assert_eq!(kv.incr("count").await.unwrap(), 3);
}

#[tokio::test]
async fn incr_rejects_non_integer_values() {
    let kv = MemoryKv::new();
    kv.set("k", "not a number", LONG).await.unwrap();
    assert!(kv.incr("k").await.is_err());
}

#[tokio::test]
async fn expire_nx_pins_ttl_once() {
    let kv = MemoryKv::new();
    kv.incr("count").await.unwrap();
    // Fresh counter has no TTL; the first expire_nx applies one.
    assert!(kv.expire_nx("count", LONG).await.unwrap());
    // A second expire_nx must not reset the window.
    assert!(!kv.expire_nx("count", Duration::from_secs(1)).await.unwrap());
    let remaining = kv.ttl("count").await.unwrap().unwrap();
    assert!(remaining > Duration::from_secs(30));
}

#[tokio::test]
async fn incr_preserves_existing_ttl() {
    let kv = MemoryKv::new();
    kv.incr("count").await.unwrap();
    kv.expire_nx("count", LONG).await.unwrap();
    kv.incr("count").await.unwrap();
    assert!(kv.ttl("count").await.unwrap().is_some());
}

#[tokio::test]
async fn ttl_reports_remaining_time() {
    let kv = MemoryKv::new();
    kv.set("k", "v", Duration::from_secs(3600)).await.unwrap();
    let remaining = kv.ttl("k").await.unwrap().unwrap();
    assert!(remaining <= Duration::from_secs(3600));
    assert!(remaining > Duration::from_secs(3590));
    assert_eq!(kv.ttl("missing").await.unwrap(), None);
}

#[tokio::test]
async fn delete_removes_keys() {
    let kv = MemoryKv::new();
    kv.set("k", "v", LONG).await.unwrap();
    kv.delete("k").await.unwrap();
    assert_eq!(kv.get("k").await.unwrap(), None);
    // Deleting an absent key is fine.
    kv.delete("k").await.unwrap();
}

#[tokio::test]
async fn scan_prefix_filters_and_limits() {
    let kv = MemoryKv::new();
    for i in 0..5 {
        kv.set(&format!("dedup:lsh:u1:{i}"), "sig", LONG).await.unwrap();
    }
    kv.set("dedup:lsh:u2:x", "sig", LONG).await.unwrap();
    kv.set("other:key", "v", LONG).await.unwrap();

    let keys = kv.scan_prefix("dedup:lsh:u1:", 100).await.unwrap();
    assert_eq!(keys.len(), 5);
    assert!(keys.iter().all(|k| k.starts_with("dedup:lsh:u1:")));

    let page = kv.scan_prefix("dedup:lsh:u1:", 2).await.unwrap();
    assert_eq!(page.len(), 2);
}
