//! Well-known bus topic names.

/// Immediate deliveries, plus matured deferred batches from the scheduler.
pub const SEND_NOW: &str = "send_now_queue";

/// Deferred (LATER) notifications awaiting digest batching.
pub const DEFER: &str = "defer_queue";
