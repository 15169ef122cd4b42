//! Weighted-random selection strategy.

use std::sync::Arc;

use rand::Rng;

use crate::registry::ServiceInstance;

/// Stateless weighted-random selector.
#[derive(Debug, Default)]
pub struct WeightedRandom;

impl WeightedRandom {
    pub fn new() -> Self {
        Self
    }

    /// Draw uniformly in `[0, total_weight)` and walk the instances
    /// accumulating weight until the running sum exceeds the draw.
    pub fn select(&self, instances: &[Arc<ServiceInstance>]) -> Option<Arc<ServiceInstance>> {
        if instances.is_empty() {
            return None;
        }
        if instances.len() == 1 {
            return Some(instances[0].clone());
        }

        let total: u64 = instances.iter().map(|i| i.weight as u64).sum();
        if total == 0 {
            return Some(instances[0].clone());
        }

        let r = rand::thread_rng().gen_range(0.0..total as f64);
        let mut running = 0.0;
        for instance in instances {
            running += instance.weight as f64;
            if running > r {
                return Some(instance.clone());
            }
        }

        // Floating point edge case: fall back to the first instance
        Some(instances[0].clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use url::Url;

    fn instance(port: u16, weight: u32) -> Arc<ServiceInstance> {
        let url = Url::parse(&format!("http://127.0.0.1:{}", port)).unwrap();
        Arc::new(ServiceInstance::new(url, weight))
    }

    #[test]
    fn test_zero_weight_instance_never_selected() {
        let lb = WeightedRandom::new();
        let instances = vec![instance(3001, 0), instance(3002, 5)];

        for _ in 0..50 {
            let picked = lb.select(&instances).unwrap();
            assert_eq!(picked.base_url.port(), Some(3002));
        }
    }

    #[test]
    fn test_weights_bias_selection() {
        let lb = WeightedRandom::new();
        let instances = vec![instance(3001, 9), instance(3002, 1)];

        let mut heavy = 0;
        for _ in 0..200 {
            if lb.select(&instances).unwrap().base_url.port() == Some(3001) {
                heavy += 1;
            }
        }
        // With 9:1 weights the heavy instance dominates
        assert!(heavy > 120, "heavy instance selected only {} times", heavy);
    }

    #[test]
    fn test_empty_returns_none() {
        let lb = WeightedRandom::new();
        assert!(lb.select(&[]).is_none());
    }
}
