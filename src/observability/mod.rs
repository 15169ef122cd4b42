//! Observability: structured logging lives with `tracing` at call sites;
//! this module owns metric recording and exposition.

pub mod metrics;
