//! Circuit breaker for backend protection.
//!
//! # States
//! - Closed: normal operation, requests pass through
//! - Open: backend assumed down, requests fail fast
//! - Half-Open: testing if backend recovered
//!
//! # State Transitions
//! ```text
//! Closed → Open: failure_count reaches threshold
//! Open → Half-Open: after open timeout, inside can_execute
//! Half-Open → Closed: probe request succeeds
//! Half-Open → Open: probe request fails
//! ```
//!
//! # Design Decisions
//! - Per-service circuit record, created lazily on first access
//! - A success while Closed decrements the failure count (floored at
//!   zero), so intermittent failures heal slowly
//! - Concurrent Half-Open probes are not serialized; several in-flight
//!   requests may all probe a recovering backend
//! - Snapshots are value copies; callers can never mutate breaker state
//!   through a returned snapshot

use std::time::{Duration, Instant};

use dashmap::DashMap;

use crate::config::schema::CircuitBreakerConfig;
use crate::observability::metrics;

/// Circuit state for one service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl CircuitState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CircuitState::Closed => "closed",
            CircuitState::Open => "open",
            CircuitState::HalfOpen => "half_open",
        }
    }
}

/// Read-only copy of a service's circuit record.
#[derive(Debug, Clone, Copy)]
pub struct CircuitSnapshot {
    pub state: CircuitState,
    pub failure_count: u32,
    pub last_failure: Option<Instant>,
}

#[derive(Debug)]
struct CircuitRecord {
    state: CircuitState,
    failure_count: u32,
    last_failure: Option<Instant>,
}

impl Default for CircuitRecord {
    fn default() -> Self {
        Self {
            state: CircuitState::Closed,
            failure_count: 0,
            last_failure: None,
        }
    }
}

/// Per-service failure-tracking state machine gating request attempts.
#[derive(Debug)]
pub struct CircuitBreaker {
    records: DashMap<String, CircuitRecord>,
    failure_threshold: u32,
    open_timeout: Duration,
}

impl CircuitBreaker {
    pub fn new(config: &CircuitBreakerConfig) -> Self {
        Self::with_settings(
            config.failure_threshold,
            Duration::from_millis(config.open_timeout_ms),
        )
    }

    pub fn with_settings(failure_threshold: u32, open_timeout: Duration) -> Self {
        Self {
            records: DashMap::new(),
            failure_threshold,
            open_timeout,
        }
    }

    /// May a request for this service be attempted right now?
    ///
    /// An Open circuit whose cooldown has elapsed transitions to Half-Open
    /// before returning true. The DashMap entry lock makes the check and
    /// transition atomic per service.
    pub fn can_execute(&self, service: &str) -> bool {
        let mut record = self.records.entry(service.to_string()).or_default();
        match record.state {
            CircuitState::Closed => true,
            CircuitState::HalfOpen => true,
            CircuitState::Open => {
                let cooled_down = record
                    .last_failure
                    .map(|t| t.elapsed() >= self.open_timeout)
                    .unwrap_or(true);
                if cooled_down {
                    record.state = CircuitState::HalfOpen;
                    tracing::info!(service = %service, "Circuit half-open, allowing probe");
                    metrics::record_circuit_transition(service, CircuitState::HalfOpen.as_str());
                    true
                } else {
                    false
                }
            }
        }
    }

    /// Record a successful call outcome.
    pub fn record_success(&self, service: &str) {
        let mut record = self.records.entry(service.to_string()).or_default();
        match record.state {
            CircuitState::HalfOpen => {
                record.state = CircuitState::Closed;
                record.failure_count = 0;
                tracing::info!(service = %service, "Circuit closed after successful probe");
                metrics::record_circuit_transition(service, CircuitState::Closed.as_str());
            }
            CircuitState::Closed => {
                record.failure_count = record.failure_count.saturating_sub(1);
            }
            CircuitState::Open => {}
        }
    }

    /// Record a transport-level failure.
    pub fn record_failure(&self, service: &str) {
        let mut record = self.records.entry(service.to_string()).or_default();
        record.last_failure = Some(Instant::now());
        // Keeps counting while Open, so the count must not wrap
        record.failure_count = record.failure_count.saturating_add(1);

        match record.state {
            CircuitState::HalfOpen => {
                record.state = CircuitState::Open;
                tracing::warn!(service = %service, "Probe failed, circuit reopened");
                metrics::record_circuit_transition(service, CircuitState::Open.as_str());
            }
            CircuitState::Closed if record.failure_count >= self.failure_threshold => {
                record.state = CircuitState::Open;
                tracing::warn!(
                    service = %service,
                    failures = record.failure_count,
                    "Failure threshold reached, circuit opened"
                );
                metrics::record_circuit_transition(service, CircuitState::Open.as_str());
            }
            _ => {}
        }
    }

    /// Read-only snapshot of a service's circuit record.
    pub fn snapshot(&self, service: &str) -> CircuitSnapshot {
        self.records
            .get(service)
            .map(|r| CircuitSnapshot {
                state: r.state,
                failure_count: r.failure_count,
                last_failure: r.last_failure,
            })
            .unwrap_or(CircuitSnapshot {
                state: CircuitState::Closed,
                failure_count: 0,
                last_failure: None,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn breaker(threshold: u32, timeout_ms: u64) -> CircuitBreaker {
        CircuitBreaker::with_settings(threshold, Duration::from_millis(timeout_ms))
    }

    #[test]
    fn test_opens_after_threshold_failures() {
        let cb = breaker(3, 10_000);
        assert!(cb.can_execute("users"));

        cb.record_failure("users");
        cb.record_failure("users");
        assert!(cb.can_execute("users"));
        assert_eq!(cb.snapshot("users").state, CircuitState::Closed);

        cb.record_failure("users");
        assert_eq!(cb.snapshot("users").state, CircuitState::Open);
        assert!(!cb.can_execute("users"));
    }

    #[test]
    fn test_half_open_after_timeout() {
        let cb = breaker(1, 50);
        cb.record_failure("users");
        assert!(!cb.can_execute("users"));

        std::thread::sleep(Duration::from_millis(60));
        assert!(cb.can_execute("users"));
        assert_eq!(cb.snapshot("users").state, CircuitState::HalfOpen);
    }

    #[test]
    fn test_half_open_success_closes() {
        let cb = breaker(1, 50);
        cb.record_failure("users");
        std::thread::sleep(Duration::from_millis(60));
        assert!(cb.can_execute("users"));

        cb.record_success("users");
        let snap = cb.snapshot("users");
        assert_eq!(snap.state, CircuitState::Closed);
        assert_eq!(snap.failure_count, 0);
    }

    #[test]
    fn test_half_open_failure_reopens() {
        let cb = breaker(1, 50);
        cb.record_failure("users");
        std::thread::sleep(Duration::from_millis(60));
        assert!(cb.can_execute("users"));

        cb.record_failure("users");
        assert_eq!(cb.snapshot("users").state, CircuitState::Open);
        assert!(!cb.can_execute("users"));
    }

    #[test]
    fn test_closed_success_decrements_floored() {
        let cb = breaker(5, 10_000);
        cb.record_failure("users");
        cb.record_failure("users");
        assert_eq!(cb.snapshot("users").failure_count, 2);

        cb.record_success("users");
        assert_eq!(cb.snapshot("users").failure_count, 1);

        cb.record_success("users");
        cb.record_success("users");
        assert_eq!(cb.snapshot("users").failure_count, 0);
    }

    #[test]
    fn test_failures_keep_counting_while_open() {
        let cb = breaker(2, 10_000);
        for _ in 0..50 {
            cb.record_failure("users");
        }
        let snap = cb.snapshot("users");
        assert_eq!(snap.state, CircuitState::Open);
        assert_eq!(snap.failure_count, 50);
    }

    #[test]
    fn test_services_are_independent() {
        let cb = breaker(1, 10_000);
        cb.record_failure("users");
        assert!(!cb.can_execute("users"));
        assert!(cb.can_execute("billing"));
    }
}
