//! In-process message bus backed by a `tokio::sync::broadcast` channel.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Default buffer capacity for the broadcast channel.
const DEFAULT_CAPACITY: usize = 1024;

/// Error type for bus publishes. Publish failures are logged by callers and
/// never abort the pipeline; the persisted event row is the source of truth.
#[derive(Debug, thiserror::Error)]
pub enum BusError {
    #[error("Bus publish failed: {0}")]
    Publish(String),
}

/// A keyed JSON message on a named topic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusMessage {
    pub topic: String,
    /// Partition key: always the `user_id`, giving downstream consumers
    /// per-user ordering.
    pub key: String,
    pub payload: serde_json::Value,
}

/// Publisher interface used by the dispatcher and the digest scheduler.
#[async_trait]
pub trait MessageBus: Send + Sync {
    async fn publish(&self, topic: &str, key: &str, payload: serde_json::Value)
        -> Result<(), BusError>;
}

/// In-process fan-out bus.
///
/// Wraps a [`broadcast::Sender`] so that any number of subscribers can
/// independently receive every published message. When the buffer is full,
/// the oldest un-consumed messages are dropped and slow receivers observe a
/// `RecvError::Lagged`.
pub struct BroadcastBus {
    sender: broadcast::Sender<BusMessage>,
}

impl BroadcastBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Subscribe to all messages published on this bus.
    pub fn subscribe(&self) -> broadcast::Receiver<BusMessage> {
        self.sender.subscribe()
    }
}

impl Default for BroadcastBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[async_trait]
impl MessageBus for BroadcastBus {
    async fn publish(
        &self,
        topic: &str,
        key: &str,
        payload: serde_json::Value,
    ) -> Result<(), BusError> {
        // Ignore the SendError — it only means there are zero receivers.
        let _ = self.sender.send(BusMessage {
            topic: topic.to_string(),
            key: key.to_string(),
            payload,
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topics;
    use serde_json::json;

    #[tokio::test]
    async fn publish_and_receive_single_subscriber() {
        let bus = BroadcastBus::default();
        let mut rx = bus.subscribe();

        bus.publish(topics::SEND_NOW, "user_1", json!({"event_id": "e1"}))
            .await
            .unwrap();

        let received = rx.recv().await.expect("should receive the message");
        assert_eq!(received.topic, "send_now_queue");
        assert_eq!(received.key, "user_1");
        assert_eq!(received.payload["event_id"], "e1");
    }

    #[tokio::test]
    async fn multiple_subscribers_receive_same_message() {
        let bus = BroadcastBus::default();
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();

        bus.publish(topics::DEFER, "user_2", json!({})).await.unwrap();

        assert_eq!(rx1.recv().await.unwrap().key, "user_2");
        assert_eq!(rx2.recv().await.unwrap().key, "user_2");
    }

    #[tokio::test]
    async fn publish_with_no_subscribers_does_not_error() {
        let bus = BroadcastBus::default();
        bus.publish(topics::SEND_NOW, "user_3", json!({"orphan": true}))
            .await
            .unwrap();
    }
}
