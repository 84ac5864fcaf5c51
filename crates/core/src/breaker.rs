//! Circuit breaker state machine for the external scoring call.
//!
//! `closed → open` after a configured number of consecutive failures,
//! `open → half_open` once the recovery timeout elapses, and one successful
//! probe closes it again. A failed probe re-opens immediately.

use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Observable breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug)]
struct Inner {
    consecutive_failures: u32,
    opened_at: Option<Instant>,
    probing: bool,
}

/// Thread-safe circuit breaker.
#[derive(Debug)]
pub struct CircuitBreaker {
    failure_threshold: u32,
    recovery_timeout: Duration,
    inner: Mutex<Inner>,
}

impl CircuitBreaker {
    pub fn new(failure_threshold: u32, recovery_timeout: Duration) -> Self {
        Self {
            failure_threshold,
            recovery_timeout,
            inner: Mutex::new(Inner {
                consecutive_failures: 0,
                opened_at: None,
                probing: false,
            }),
        }
    }

    /// Whether a call may proceed right now.
    ///
    /// Returns `false` while open. After the recovery timeout the breaker
    /// moves to half-open and admits a single probe call; concurrent callers
    /// keep being rejected until that probe reports back.
    pub fn try_acquire(&self) -> bool {
        let mut inner = self.inner.lock().expect("breaker lock poisoned");
        match inner.opened_at {
            None => true,
            Some(opened_at) => {
                if opened_at.elapsed() < self.recovery_timeout {
                    return false;
                }
                if inner.probing {
                    return false;
                }
                inner.probing = true;
                true
            }
        }
    }

    /// Record a successful call: resets the failure count and closes the
    /// breaker if it was half-open.
    pub fn record_success(&self) {
        let mut inner = self.inner.lock().expect("breaker lock poisoned");
        inner.consecutive_failures = 0;
        inner.opened_at = None;
        inner.probing = false;
    }

    /// Record a failed call: opens the breaker once the consecutive-failure
    /// threshold is reached, and re-opens immediately after a failed probe.
    pub fn record_failure(&self) {
        let mut inner = self.inner.lock().expect("breaker lock poisoned");
        if inner.probing {
            inner.opened_at = Some(Instant::now());
            inner.probing = false;
            return;
        }
        inner.consecutive_failures += 1;
        if inner.consecutive_failures >= self.failure_threshold {
            inner.opened_at = Some(Instant::now());
        }
    }

    /// Current state, for logging and tests.
    pub fn state(&self) -> BreakerState {
        let inner = self.inner.lock().expect("breaker lock poisoned");
        match inner.opened_at {
            None => BreakerState::Closed,
            Some(opened_at) => {
                if opened_at.elapsed() >= self.recovery_timeout {
                    BreakerState::HalfOpen
                } else {
                    BreakerState::Open
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn breaker(timeout_ms: u64) -> CircuitBreaker {
        CircuitBreaker::new(3, Duration::from_millis(timeout_ms))
    }

    #[test]
    fn starts_closed_and_admits_calls() {
        let cb = breaker(50);
        assert_eq!(cb.state(), BreakerState::Closed);
        assert!(cb.try_acquire());
    }

    #[test]
    fn opens_after_three_consecutive_failures() {
        let cb = breaker(10_000);
        cb.record_failure();
        cb.record_failure();
        assert_eq!(cb.state(), BreakerState::Closed);
        cb.record_failure();
        assert_eq!(cb.state(), BreakerState::Open);
        assert!(!cb.try_acquire());
    }

    #[test]
    fn success_resets_the_failure_count() {
        let cb = breaker(10_000);
        cb.record_failure();
        cb.record_failure();
        cb.record_success();
        cb.record_failure();
        cb.record_failure();
        assert_eq!(cb.state(), BreakerState::Closed);
    }

    #[test]
    fn half_open_admits_one_probe_and_success_closes() {
        let cb = breaker(20);
        for _ in 0..3 {
            cb.record_failure();
        }
        assert!(!cb.try_acquire());

        std::thread::sleep(Duration::from_millis(30));
        assert_eq!(cb.state(), BreakerState::HalfOpen);
        assert!(cb.try_acquire(), "first caller gets the probe");
        assert!(!cb.try_acquire(), "concurrent callers are rejected");

        cb.record_success();
        assert_eq!(cb.state(), BreakerState::Closed);
        assert!(cb.try_acquire());
    }

    #[test]
    fn failed_probe_reopens() {
        let cb = breaker(20);
        for _ in 0..3 {
            cb.record_failure();
        }
        std::thread::sleep(Duration::from_millis(30));
        assert!(cb.try_acquire());
        cb.record_failure();
        assert_eq!(cb.state(), BreakerState::Open);
        assert!(!cb.try_acquire());
    }
}
