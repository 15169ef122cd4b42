//! Round-robin selection strategy.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use dashmap::DashMap;

use crate::registry::ServiceInstance;

/// Cyclic selector with one counter per service name.
#[derive(Debug, Default)]
pub struct RoundRobin {
    counters: DashMap<String, AtomicUsize>,
}

impl RoundRobin {
    pub fn new() -> Self {
        Self::default()
    }

    /// Select the next instance for this service.
    /// The fetch_add makes the counter advance atomic per service.
    pub fn select(
        &self,
        service: &str,
        instances: &[Arc<ServiceInstance>],
    ) -> Option<Arc<ServiceInstance>> {
        match instances.len() {
            0 => None,
            1 => Some(instances[0].clone()),
            len => {
                let counter = self
                    .counters
                    .entry(service.to_string())
                    .or_insert_with(|| AtomicUsize::new(0));
                let c = counter.fetch_add(1, Ordering::Relaxed);
                Some(instances[c % len].clone())
            }
        }
    }
}
