//! Single-request proxy orchestration.
//!
//! # Responsibilities
//! - Consult registry and circuit breaker before any network call
//! - Select an instance, build the outbound request, enforce timeout
//! - Retry transport failures with linear backoff
//! - Record the final outcome on the breaker exactly once
//!
//! # Design Decisions
//! - A non-2xx backend status is not a transport failure: it is returned
//!   unchanged and counts as breaker success
//! - Cancellation never interrupts an in-flight call; it only stops new
//!   retries from being scheduled

use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use axum::body::{Body, Bytes};
use axum::http::{HeaderMap, HeaderValue, Method, StatusCode, Uri};
use hyper_util::client::legacy::{connect::HttpConnector, Client};
use hyper_util::rt::TokioExecutor;
use url::Url;

use crate::config::schema::RetryConfig;
use crate::error::GatewayError;
use crate::load_balancer::LoadBalancer;
use crate::registry::ServiceRegistry;
use crate::resilience::backoff::retry_delay;
use crate::resilience::CircuitBreaker;

/// Headers carried through from the inbound request to the backend.
const FORWARD_HEADERS: &[&str] = &["authorization", "content-type", "user-agent", "x-real-ip"];

/// An inbound request, reduced to what forwarding needs.
#[derive(Debug, Clone, Default)]
pub struct ProxyRequest {
    pub method: Method,
    pub headers: HeaderMap,
    pub body: Bytes,
    /// Raw query string, without the leading '?'.
    pub query: Option<String>,
    /// Original caller address for x-forwarded-for.
    pub caller_addr: Option<String>,
}

/// The backend's response, buffered.
#[derive(Debug, Clone)]
pub struct ProxyResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// How one forwarding attempt failed at the transport level.
#[derive(Debug)]
enum AttemptError {
    Timeout(Duration),
    Connect(String),
    Transport(String),
}

/// Orchestrates HTTP forwarding with resilience policy applied.
pub struct ProxyService {
    registry: Arc<ServiceRegistry>,
    breaker: Arc<CircuitBreaker>,
    balancer: Arc<LoadBalancer>,
    client: Client<HttpConnector, Body>,
    retry: RetryConfig,
}

impl ProxyService {
    pub fn new(
        registry: Arc<ServiceRegistry>,
        breaker: Arc<CircuitBreaker>,
        balancer: Arc<LoadBalancer>,
        retry: RetryConfig,
    ) -> Self {
        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());
        Self {
            registry,
            breaker,
            balancer,
            client,
            retry,
        }
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    pub fn registry(&self) -> &ServiceRegistry {
        &self.registry
    }

    /// Forward one request to the named service.
    pub async fn proxy_request(
        &self,
        service_name: &str,
        path: &str,
        request: ProxyRequest,
    ) -> Result<ProxyResponse, GatewayError> {
        let entry = self.registry.get(service_name)?;

        if !self.breaker.can_execute(service_name) {
            tracing::warn!(service = %service_name, "Circuit open, failing fast");
            return Err(GatewayError::ServiceUnavailable {
                service: service_name.to_string(),
                reason: "circuit open".to_string(),
            });
        }

        let instances = entry.healthy_instances();
        let instance = self
            .balancer
            .select_instance(service_name, &instances)
            .ok_or_else(|| GatewayError::ServiceUnavailable {
                service: service_name.to_string(),
                reason: "no instances registered".to_string(),
            })?;

        let uri = build_target_uri(&instance.base_url, path, request.query.as_deref())
            .map_err(|e| GatewayError::BadGateway {
                service: service_name.to_string(),
                message: format!("invalid target URI: {}", e),
            })?;

        let request_id = generate_request_id();
        let timeout = entry.timeout();

        tracing::debug!(
            request_id = %request_id,
            service = %service_name,
            uri = %uri,
            method = %request.method,
            "Proxying request"
        );

        let mut attempt: u32 = 0;
        loop {
            match self
                .attempt(&uri, &request, &request_id, timeout)
                .await
            {
                Ok(response) => {
                    self.breaker.record_success(service_name);
                    return Ok(response);
                }
                Err(e) => {
                    if attempt < self.retry.max_retries {
                        attempt += 1;
                        let delay = retry_delay(attempt, self.retry.base_delay_ms);
                        tracing::info!(
                            request_id = %request_id,
                            service = %service_name,
                            attempt,
                            delay_ms = delay.as_millis() as u64,
                            error = ?e,
                            "Retrying after transport failure"
                        );
                        tokio::time::sleep(delay).await;
                        continue;
                    }

                    self.breaker.record_failure(service_name);
                    tracing::error!(
                        request_id = %request_id,
                        service = %service_name,
                        error = ?e,
                        "Giving up after transport failures"
                    );
                    return Err(map_attempt_error(service_name, e));
                }
            }
        }
    }

    /// One forwarding attempt: build the outbound request, send, buffer.
    async fn attempt(
        &self,
        uri: &Uri,
        request: &ProxyRequest,
        request_id: &str,
        timeout: Duration,
    ) -> Result<ProxyResponse, AttemptError> {
        let mut builder = axum::http::Request::builder()
            .method(request.method.clone())
            .uri(uri.clone());

        if let Some(headers) = builder.headers_mut() {
            for name in FORWARD_HEADERS {
                if let Some(value) = request.headers.get(*name) {
                    headers.insert(
                        axum::http::HeaderName::from_static(*name),
                        value.clone(),
                    );
                }
            }
            if let Some(addr) = &request.caller_addr {
                if let Ok(value) = HeaderValue::from_str(addr) {
                    headers.insert("x-forwarded-for", value);
                }
            }
            if let Ok(value) = HeaderValue::from_str(request_id) {
                headers.insert("x-gateway-request-id", value);
            }
        }

        let outbound = builder
            .body(Body::from(request.body.clone()))
            .map_err(|e| AttemptError::Transport(e.to_string()))?;

        let response = match tokio::time::timeout(timeout, self.client.request(outbound)).await {
            Ok(Ok(response)) => response,
            Ok(Err(e)) if e.is_connect() => return Err(AttemptError::Connect(e.to_string())),
            Ok(Err(e)) => return Err(AttemptError::Transport(e.to_string())),
            Err(_) => return Err(AttemptError::Timeout(timeout)),
        };

        let (parts, body) = response.into_parts();
        let body = axum::body::to_bytes(Body::new(body), usize::MAX)
            .await
            .map_err(|e| AttemptError::Transport(e.to_string()))?;

        Ok(ProxyResponse {
            status: parts.status,
            headers: parts.headers,
            body,
        })
    }
}

/// Map a final transport failure to the caller-facing taxonomy.
fn map_attempt_error(service: &str, error: AttemptError) -> GatewayError {
    match error {
        AttemptError::Timeout(timeout) => GatewayError::ServiceUnavailable {
            service: service.to_string(),
            reason: format!("timed out after {}ms", timeout.as_millis()),
        },
        AttemptError::Connect(message) => GatewayError::BadGateway {
            service: service.to_string(),
            message,
        },
        AttemptError::Transport(message) => GatewayError::BadGateway {
            service: service.to_string(),
            message,
        },
    }
}

/// Concatenate base URL, path, and query into the outbound URI.
fn build_target_uri(
    base: &Url,
    path: &str,
    query: Option<&str>,
) -> Result<Uri, axum::http::uri::InvalidUri> {
    let mut target = base.as_str().trim_end_matches('/').to_string();
    target.push_str(path);
    if let Some(q) = query {
        if !q.is_empty() {
            target.push('?');
            target.push_str(q);
        }
    }
    Uri::from_str(&target)
}

/// Correlation id of the form `gw-<timestamp>-<random>`.
pub fn generate_request_id() -> String {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis();
    let suffix: String = (0..8).map(|_| fastrand::alphanumeric()).collect();
    format!("gw-{}-{}", millis, suffix)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_target_uri() {
        let base = Url::parse("http://127.0.0.1:3001").unwrap();
        let uri = build_target_uri(&base, "/api/users/42", None).unwrap();
        assert_eq!(uri.to_string(), "http://127.0.0.1:3001/api/users/42");

        let uri = build_target_uri(&base, "/api/users", Some("page=2&limit=10")).unwrap();
        assert_eq!(
            uri.to_string(),
            "http://127.0.0.1:3001/api/users?page=2&limit=10"
        );
    }

    #[test]
    fn test_request_id_format() {
        let id = generate_request_id();
        assert!(id.starts_with("gw-"));
        let parts: Vec<_> = id.splitn(3, '-').collect();
        assert_eq!(parts.len(), 3);
        assert!(parts[1].chars().all(|c| c.is_ascii_digit()));
        assert_eq!(parts[2].len(), 8);
    }

    #[test]
    fn test_request_ids_are_unique() {
        let a = generate_request_id();
        let b = generate_request_id();
        assert_ne!(a, b);
    }
}
