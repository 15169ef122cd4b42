//! Failure isolation for backend calls.
//!
//! # Components
//! - `circuit_breaker`: per-service state machine gating attempts
//! - `backoff`: delay schedule between retry attempts
//!
//! # Design Decisions
//! - Only transport-level failures count against the breaker; backend
//!   4xx/5xx responses are returned to the caller unchanged
//! - The breaker's open timeout is independent of request timeouts

pub mod backoff;
pub mod circuit_breaker;

pub use circuit_breaker::{CircuitBreaker, CircuitSnapshot, CircuitState};
