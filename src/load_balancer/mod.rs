//! Instance selection among a service's registered instances.
//!
//! # Design Decisions
//! - Strategies are pure selection: no health filtering inside; callers
//!   pass the instance set they consider eligible
//! - Round-robin keeps one atomic counter per service name, so the
//!   rotation survives across requests and is atomic under concurrency

pub mod round_robin;
pub mod weighted;

use std::sync::Arc;

use crate::registry::ServiceInstance;
use round_robin::RoundRobin;
use weighted::WeightedRandom;

/// Selects one instance among several registered for a service name.
#[derive(Debug, Default)]
pub struct LoadBalancer {
    round_robin: RoundRobin,
    weighted: WeightedRandom,
}

impl LoadBalancer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Round-robin selection with a per-service counter.
    pub fn select_instance(
        &self,
        service: &str,
        instances: &[Arc<ServiceInstance>],
    ) -> Option<Arc<ServiceInstance>> {
        self.round_robin.select(service, instances)
    }

    /// Weighted-random selection by instance weight.
    pub fn select_weighted(
        &self,
        _service: &str,
        instances: &[Arc<ServiceInstance>],
    ) -> Option<Arc<ServiceInstance>> {
        self.weighted.select(instances)
    }
}
