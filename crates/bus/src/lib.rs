//! Message bus abstraction for dispatch topics.
//!
//! The dispatcher and the digest scheduler publish JSON messages keyed by
//! `user_id` (downstream consumers rely on the key for per-user ordering).
//! They only talk to the [`MessageBus`] trait; [`BroadcastBus`] is the
//! in-process implementation used by tests and single-node deployments,
//! while a Kafka-backed producer plugs in behind the same trait using the
//! topic names from [`topics`].

pub mod bus;
pub mod topics;

pub use bus::{BroadcastBus, BusError, BusMessage, MessageBus};
