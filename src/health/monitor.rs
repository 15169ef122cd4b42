//! Active health probing.
//!
//! # Responsibilities
//! - Periodically probe every registered instance's health path
//! - Flip the instance health flag based on the result
//!
//! The routing core only reads the flag; this task is the sole writer.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::Request;
use hyper_util::client::legacy::{connect::HttpConnector, Client};
use hyper_util::rt::TokioExecutor;
use tokio::sync::broadcast;
use tokio::time;

use crate::config::schema::HealthCheckConfig;
use crate::observability::metrics;
use crate::registry::ServiceRegistry;

pub struct HealthMonitor {
    registry: Arc<ServiceRegistry>,
    config: HealthCheckConfig,
    client: Client<HttpConnector, Body>,
}

impl HealthMonitor {
    pub fn new(registry: Arc<ServiceRegistry>, config: HealthCheckConfig) -> Self {
        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());
        Self {
            registry,
            config,
            client,
        }
    }

    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        if !self.config.enabled {
            tracing::info!("Active health checks disabled");
            return;
        }

        tracing::info!(
            interval = self.config.interval_secs,
            "Health monitor starting"
        );

        let mut ticker = time::interval(Duration::from_secs(self.config.interval_secs));
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.check_all().await;
                }
                _ = shutdown.recv() => {
                    tracing::info!("Health monitor stopping");
                    break;
                }
            }
        }
    }

    async fn check_all(&self) {
        let timeout = Duration::from_secs(self.config.timeout_secs);

        for entry in self.registry.list() {
            let health_path = entry.config.health_path.clone();

            for instance in &entry.instances {
                let uri = format!(
                    "{}{}",
                    instance.base_url.as_str().trim_end_matches('/'),
                    health_path
                );

                let request = match Request::builder()
                    .method("GET")
                    .uri(&uri)
                    .header("user-agent", "edge-gateway-health-check")
                    .body(Body::empty())
                {
                    Ok(request) => request,
                    Err(e) => {
                        tracing::error!(uri = %uri, error = %e, "Failed to build health probe");
                        continue;
                    }
                };

                let healthy = match time::timeout(timeout, self.client.request(request)).await {
                    Ok(Ok(response)) => {
                        let success = response.status().is_success();
                        if !success {
                            tracing::warn!(
                                service = %entry.config.name,
                                uri = %uri,
                                status = %response.status(),
                                "Health probe returned non-success"
                            );
                        }
                        success
                    }
                    Ok(Err(e)) => {
                        tracing::warn!(service = %entry.config.name, uri = %uri, error = %e, "Health probe failed");
                        false
                    }
                    Err(_) => {
                        tracing::warn!(service = %entry.config.name, uri = %uri, "Health probe timed out");
                        false
                    }
                };

                instance.set_healthy(healthy);
                metrics::record_instance_health(instance.base_url.as_str(), healthy);
            }
        }
    }
}
