//! Service registry: logical service name → backend locations.
//!
//! # Responsibilities
//! - Hold the process-wide map of registered services
//! - Expand each service into its instance set for load balancing
//! - Expose health flags that the active prober flips
//!
//! # Design Decisions
//! - Populated once at startup from configuration; `register` stays an
//!   idempotent upsert so tests and future control planes can reuse it
//! - `get` on an unknown name is the only error this component produces
//! - Instance health is an AtomicBool written by the prober and read by
//!   the routing core, never the other way around

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use url::Url;

use crate::config::ServiceConfig;
use crate::error::GatewayError;

/// One reachable instance of a service.
#[derive(Debug)]
pub struct ServiceInstance {
    /// Pre-parsed base URL.
    pub base_url: Url,
    /// Weight for weighted load balancing.
    pub weight: u32,
    /// Health flag, mutated only by the health prober.
    healthy: AtomicBool,
}

impl ServiceInstance {
    pub fn new(base_url: Url, weight: u32) -> Self {
        Self {
            base_url,
            weight,
            // Unprobed instances are assumed reachable
            healthy: AtomicBool::new(true),
        }
    }

    pub fn is_healthy(&self) -> bool {
        self.healthy.load(Ordering::Relaxed)
    }

    pub fn set_healthy(&self, healthy: bool) {
        self.healthy.store(healthy, Ordering::Relaxed);
    }
}

/// A registered service: its immutable config plus expanded instances.
#[derive(Debug)]
pub struct ServiceEntry {
    pub config: ServiceConfig,
    pub instances: Vec<Arc<ServiceInstance>>,
}

impl ServiceEntry {
    /// Per-request timeout configured for this service.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.config.timeout_ms)
    }

    /// Instances currently marked healthy. Falls back to the full set when
    /// the prober has marked everything down, so a misbehaving probe can
    /// degrade service quality but never blackhole it.
    pub fn healthy_instances(&self) -> Vec<Arc<ServiceInstance>> {
        let healthy: Vec<_> = self
            .instances
            .iter()
            .filter(|i| i.is_healthy())
            .cloned()
            .collect();
        if healthy.is_empty() {
            self.instances.clone()
        } else {
            healthy
        }
    }
}

/// Process-wide mapping from logical service name to its entry.
#[derive(Debug, Default)]
pub struct ServiceRegistry {
    services: DashMap<String, Arc<ServiceEntry>>,
}

impl ServiceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from startup configuration.
    /// URLs are pre-validated by config validation; entries that still fail
    /// to parse are skipped with a warning rather than aborting the rest.
    pub fn from_config(services: &[ServiceConfig]) -> Self {
        let registry = Self::new();
        for service in services {
            registry.register(service.clone());
        }
        registry
    }

    /// Register a service (idempotent upsert by name).
    pub fn register(&self, config: ServiceConfig) {
        let mut instances = Vec::with_capacity(1 + config.replicas.len());

        match Url::parse(&config.base_url) {
            Ok(url) => instances.push(Arc::new(ServiceInstance::new(url, config.weight))),
            Err(e) => {
                tracing::warn!(service = %config.name, url = %config.base_url, error = %e, "Skipping service with invalid base URL");
                return;
            }
        }
        for replica in &config.replicas {
            match Url::parse(&replica.base_url) {
                Ok(url) => instances.push(Arc::new(ServiceInstance::new(url, replica.weight))),
                Err(e) => {
                    tracing::warn!(service = %config.name, url = %replica.base_url, error = %e, "Skipping replica with invalid URL");
                }
            }
        }

        tracing::debug!(service = %config.name, instances = instances.len(), "Service registered");
        self.services.insert(
            config.name.clone(),
            Arc::new(ServiceEntry { config, instances }),
        );
    }

    /// Look up a service by name.
    pub fn get(&self, name: &str) -> Result<Arc<ServiceEntry>, GatewayError> {
        self.services
            .get(name)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| GatewayError::ServiceUnavailable {
                service: name.to_string(),
                reason: "not registered".to_string(),
            })
    }

    /// All registered services.
    pub fn list(&self) -> Vec<Arc<ServiceEntry>> {
        self.services.iter().map(|e| e.value().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }
}
