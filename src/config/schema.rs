//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the edge gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listener configuration (bind address, connection limit).
    pub listener: ListenerConfig,

    /// Backend service definitions (the service registry contents).
    pub services: Vec<ServiceConfig>,

    /// Path-prefix routes mapping requests to services.
    pub routes: Vec<RouteConfig>,

    /// Circuit breaker tunables.
    pub circuit_breaker: CircuitBreakerConfig,

    /// Response cache settings.
    pub cache: CacheConfig,

    /// Rate limiting configuration.
    pub rate_limit: RateLimitConfig,

    /// Request validation limits.
    pub validation: ValidationConfig,

    /// Retry configuration for proxied calls.
    pub retries: RetryConfig,

    /// WebSocket proxy settings.
    pub websocket: WebSocketConfig,

    /// Active health probe settings.
    pub health_check: HealthCheckConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Maximum requests served concurrently; excess waits for a slot.
    pub max_connections: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            max_connections: 10_000,
        }
    }
}

/// A backend service registered with the gateway.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServiceConfig {
    /// Logical service name (registry key).
    pub name: String,

    /// Base URL of the primary instance (e.g., "http://127.0.0.1:3001").
    pub base_url: String,

    /// Per-request timeout for this service, in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Path probed by the health monitor.
    #[serde(default = "default_health_path")]
    pub health_path: String,

    /// Weight for weighted load balancing.
    #[serde(default = "default_weight")]
    pub weight: u32,

    /// Additional instances of this service, for load balancing.
    /// When empty, the service has exactly one instance (`base_url`).
    #[serde(default)]
    pub replicas: Vec<ReplicaConfig>,
}

/// An additional instance of a service.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ReplicaConfig {
    /// Base URL of the replica.
    pub base_url: String,

    /// Weight for weighted load balancing.
    #[serde(default = "default_weight")]
    pub weight: u32,
}

fn default_timeout_ms() -> u64 {
    30_000
}

fn default_health_path() -> String {
    "/health".to_string()
}

fn default_weight() -> u32 {
    1
}

/// Route configuration mapping a path prefix to a service.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RouteConfig {
    /// Path prefix to match (e.g., "/api/users").
    pub prefix: String,

    /// Service name to forward to. Must reference a registered service.
    pub service: String,
}

/// Circuit breaker tunables.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures before the circuit opens.
    pub failure_threshold: u32,

    /// Cooldown before an open circuit allows a probe, in milliseconds.
    pub open_timeout_ms: u64,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            open_timeout_ms: 10_000,
        }
    }
}

/// Response cache settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Enable response caching for idempotent reads.
    pub enabled: bool,

    /// Default entry TTL in seconds.
    pub default_ttl_secs: u64,

    /// Interval between background sweeps, in seconds.
    pub sweep_interval_secs: u64,

    /// Paths containing any of these fragments are never cached.
    pub exclude_paths: Vec<String>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            default_ttl_secs: 120,
            sweep_interval_secs: 300,
            exclude_paths: vec!["/stats".to_string(), "/kpis".to_string()],
        }
    }
}

/// Rate limiting configuration (fixed window per caller identity).
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Enable rate limiting.
    pub enabled: bool,

    /// Window length in milliseconds.
    pub window_ms: u64,

    /// Maximum requests allowed per window.
    pub max_requests: u32,

    /// Interval between expired-window sweeps, in seconds.
    pub sweep_interval_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            window_ms: 60_000,
            max_requests: 100,
            sweep_interval_secs: 60,
        }
    }
}

/// Request validation limits.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ValidationConfig {
    /// Maximum declared content length in bytes.
    pub max_body_bytes: u64,

    /// Maximum path length in characters.
    pub max_path_length: usize,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            max_body_bytes: 10 * 1024 * 1024,
            max_path_length: 2048,
        }
    }
}

/// Retry configuration for proxied calls.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Additional attempts after the first failure.
    pub max_retries: u32,

    /// Base backoff delay in milliseconds (delay = base * attempt).
    pub base_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay_ms: 1_000,
        }
    }
}

/// WebSocket proxy settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct WebSocketConfig {
    /// Well-known endpoint for persistent connections.
    pub endpoint: String,

    /// Registry name of the backend messaging service.
    pub messaging_service: String,

    /// Reject handshakes that carry no authorization header. The gateway
    /// only gates on presence; the backend decides what the token means.
    pub auth_required: bool,
}

impl Default for WebSocketConfig {
    fn default() -> Self {
        Self {
            endpoint: "/socket.io".to_string(),
            messaging_service: "messaging".to_string(),
            auth_required: false,
        }
    }
}

/// Active health probe settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HealthCheckConfig {
    /// Enable the background prober.
    pub enabled: bool,

    /// Probe interval in seconds.
    pub interval_secs: u64,

    /// Per-probe timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for HealthCheckConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            interval_secs: 10,
            timeout_secs: 2,
        }
    }
}

/// Observability settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Enable the Prometheus exposition endpoint.
    pub metrics_enabled: bool,

    /// Bind address for the metrics listener.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}
