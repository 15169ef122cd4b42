//! HTTP server setup and request pipeline.
//!
//! # Responsibilities
//! - Create the Axum router with proxy and WebSocket handlers
//! - Wire up middleware (tracing, connect info)
//! - Run the pre-proxy pipeline: rate limit → validation → cache
//! - Dispatch to ProxyService and shape the response
//! - Spawn background tasks (sweepers, health prober) on run
//!
//! # Design Decisions
//! - All shared state is owned by one composed AppState built at startup
//!   and passed by handle; nothing is ambient or global
//! - Validator and rate-limiter rejections happen before any proxying
//!   and are never retried

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::{
    body::Body,
    extract::{ConnectInfo, RawQuery, State, WebSocketUpgrade},
    http::{header, HeaderMap, Method, Request, StatusCode},
    response::{IntoResponse, Response},
    routing::{any, get},
    Router,
};
use tokio::net::TcpListener;
use tower::limit::GlobalConcurrencyLimitLayer;
use tower_http::trace::TraceLayer;

use crate::cache::{cache_key, is_cacheable_path, CachedResponse, TtlCache};
use crate::config::schema::CacheConfig;
use crate::config::{GatewayConfig, RouteConfig};
use crate::error::GatewayError;
use crate::health::HealthMonitor;
use crate::lifecycle::Shutdown;
use crate::load_balancer::LoadBalancer;
use crate::observability::metrics;
use crate::proxy::{ProxyRequest, ProxyService};
use crate::registry::ServiceRegistry;
use crate::resilience::CircuitBreaker;
use crate::security::{RateLimiter, RequestValidator};
use crate::ws::WsGateway;

/// Hop-by-hop headers never copied onto the buffered response.
const STRIP_HEADERS: &[&str] = &["content-length", "transfer-encoding", "connection"];

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub proxy: Arc<ProxyService>,
    pub ws_gateway: Arc<WsGateway>,
    pub routes: Arc<Vec<RouteConfig>>,
    pub cache: Arc<TtlCache<CachedResponse>>,
    pub cache_config: CacheConfig,
    pub limiter: Arc<RateLimiter>,
    pub rate_limit_enabled: bool,
    pub validator: RequestValidator,
    pub max_body_bytes: usize,
}

/// HTTP server for the edge gateway.
pub struct HttpServer {
    router: Router,
    config: GatewayConfig,
    registry: Arc<ServiceRegistry>,
    cache: Arc<TtlCache<CachedResponse>>,
    limiter: Arc<RateLimiter>,
}

impl HttpServer {
    /// Compose all subsystems from a validated configuration.
    pub fn new(config: GatewayConfig) -> Self {
        let registry = Arc::new(ServiceRegistry::from_config(&config.services));
        let breaker = Arc::new(CircuitBreaker::new(&config.circuit_breaker));
        let balancer = Arc::new(LoadBalancer::new());
        let proxy = Arc::new(ProxyService::new(
            registry.clone(),
            breaker,
            balancer,
            config.retries.clone(),
        ));
        let mut ws_gateway = WsGateway::new(registry.clone(), &config.websocket);
        if config.websocket.auth_required {
            ws_gateway = ws_gateway
                .with_auth_gate(Arc::new(|headers| headers.contains_key("authorization")));
        }
        let ws_gateway = Arc::new(ws_gateway);

        let cache = Arc::new(TtlCache::new(
            std::time::Duration::from_secs(config.cache.default_ttl_secs),
            std::time::Duration::from_secs(config.cache.sweep_interval_secs),
        ));
        let limiter = Arc::new(RateLimiter::new(&config.rate_limit));

        let state = AppState {
            proxy,
            ws_gateway,
            routes: Arc::new(config.routes.clone()),
            cache: cache.clone(),
            cache_config: config.cache.clone(),
            limiter: limiter.clone(),
            rate_limit_enabled: config.rate_limit.enabled,
            validator: RequestValidator::new(&config.validation),
            max_body_bytes: usize::try_from(config.validation.max_body_bytes)
                .unwrap_or(usize::MAX),
        };

        let router = Self::build_router(&config, state);
        Self {
            router,
            config,
            registry,
            cache,
            limiter,
        }
    }

    fn build_router(config: &GatewayConfig, state: AppState) -> Router {
        Router::new()
            .route(&config.websocket.endpoint, get(ws_handler))
            .route("/{*path}", any(proxy_handler))
            .route("/", any(proxy_handler))
            .with_state(state)
            .layer(TraceLayer::new_for_http())
            // Shared semaphore, so the cap holds across connections
            .layer(GlobalConcurrencyLimitLayer::new(
                config.listener.max_connections,
            ))
    }

    /// Run the server, accepting connections on the given listener.
    /// Background tasks stop when `shutdown` triggers; it is also
    /// triggered when the serve loop itself exits.
    pub async fn run(
        self,
        listener: TcpListener,
        shutdown: Arc<Shutdown>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, services = self.registry.len(), "HTTP server starting");

        if self.config.cache.enabled {
            tokio::spawn(self.cache.clone().run_sweeper(shutdown.subscribe()));
        }
        if self.config.rate_limit.enabled {
            tokio::spawn(self.limiter.clone().run_sweeper(shutdown.subscribe()));
        }
        if self.config.health_check.enabled {
            let monitor =
                HealthMonitor::new(self.registry.clone(), self.config.health_check.clone());
            tokio::spawn(monitor.run(shutdown.subscribe()));
        }

        let app = self
            .router
            .into_make_service_with_connect_info::<SocketAddr>();

        let mut shutdown_rx = shutdown.subscribe();
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                tokio::select! {
                    _ = shutdown_rx.recv() => {}
                    _ = tokio::signal::ctrl_c() => {
                        tracing::info!("Ctrl+C received");
                    }
                }
            })
            .await?;

        shutdown.trigger();
        tracing::info!("HTTP server stopped");
        Ok(())
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    pub fn registry(&self) -> Arc<ServiceRegistry> {
        self.registry.clone()
    }
}

/// Main proxy handler: rate limit → validate → route → cache → forward.
async fn proxy_handler(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    request: Request<Body>,
) -> Response {
    let start = Instant::now();
    let path = request.uri().path().to_string();
    let method = request.method().clone();
    let method_str = method.to_string();

    let identity = client_identity(request.headers(), addr);

    if state.rate_limit_enabled && state.limiter.is_rate_limited(&identity) {
        tracing::warn!(client = %identity, path = %path, "Rate limit exceeded");
        let retry_after_secs = state
            .limiter
            .reset_time(&identity)
            .map(|t| t.saturating_duration_since(Instant::now()).as_secs())
            .unwrap_or(0);
        return GatewayError::RateLimited { retry_after_secs }.into_response();
    }

    let content_length = request
        .headers()
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok());
    if let Err(e) = state.validator.validate(&path, content_length) {
        tracing::warn!(client = %identity, path = %path, error = %e, "Request rejected by validator");
        return GatewayError::Validation(e).into_response();
    }

    let Some(route) = match_route(&state.routes, &path) else {
        tracing::debug!(path = %path, "No route matched");
        return (StatusCode::NOT_FOUND, "no matching route").into_response();
    };
    let service = route.service.clone();

    let query = request.uri().query().map(str::to_string);

    // Response cache, idempotent reads only
    let cache_lookup_key = if state.cache_config.enabled
        && method == Method::GET
        && is_cacheable_path(&path, &state.cache_config.exclude_paths)
    {
        let params = query_params(query.as_deref());
        Some(cache_key(&service, &params))
    } else {
        None
    };

    if let Some(key) = &cache_lookup_key {
        if let Some(cached) = state.cache.get(key) {
            metrics::record_cache_event(&service, true);
            metrics::record_request(&method_str, cached.status, &service, start);
            return cached_response(cached);
        }
        metrics::record_cache_event(&service, false);
    }

    let (parts, body) = request.into_parts();
    // Same limit the validator enforces on declared lengths, so a request
    // without a content-length header cannot sidestep it.
    let body = match axum::body::to_bytes(body, state.max_body_bytes).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!(client = %identity, error = %e, "Failed to read request body");
            return (StatusCode::BAD_REQUEST, "unreadable body").into_response();
        }
    };

    let proxy_request = ProxyRequest {
        method,
        headers: parts.headers,
        body,
        query,
        caller_addr: Some(identity),
    };

    match state.proxy.proxy_request(&service, &path, proxy_request).await {
        Ok(response) => {
            metrics::record_request(&method_str, response.status.as_u16(), &service, start);

            if let Some(key) = cache_lookup_key {
                if response.status == StatusCode::OK {
                    state.cache.set(
                        key,
                        CachedResponse {
                            status: response.status.as_u16(),
                            content_type: response
                                .headers
                                .get(header::CONTENT_TYPE)
                                .and_then(|v| v.to_str().ok())
                                .map(str::to_string),
                            body: response.body.clone(),
                        },
                    );
                }
            }

            upstream_response(response)
        }
        Err(e) => {
            metrics::record_request(&method_str, e.status().as_u16(), &service, start);
            e.into_response()
        }
    }
}

/// WebSocket endpoint: upgrade and hand the socket to the gateway.
async fn ws_handler(
    State(state): State<AppState>,
    RawQuery(query): RawQuery,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> Response {
    let gateway = state.ws_gateway.clone();
    ws.on_upgrade(move |socket| gateway.handle_connection(socket, query, headers))
}

/// Caller identity for rate limiting and x-forwarded-for.
fn client_identity(headers: &HeaderMap, addr: SocketAddr) -> String {
    headers
        .get("x-real-ip")
        .or_else(|| headers.get("x-forwarded-for"))
        .and_then(|v| v.to_str().ok())
        .map(|v| v.split(',').next().unwrap_or(v).trim().to_string())
        .unwrap_or_else(|| addr.ip().to_string())
}

/// Longest matching prefix wins.
fn match_route<'a>(routes: &'a [RouteConfig], path: &str) -> Option<&'a RouteConfig> {
    routes
        .iter()
        .filter(|r| path.starts_with(&r.prefix))
        .max_by_key(|r| r.prefix.len())
}

/// Query string → sorted parameter map for cache keys.
fn query_params(query: Option<&str>) -> BTreeMap<String, String> {
    query
        .map(|q| {
            url::form_urlencoded::parse(q.as_bytes())
                .map(|(k, v)| (k.into_owned(), v.into_owned()))
                .collect()
        })
        .unwrap_or_default()
}

fn upstream_response(response: crate::proxy::ProxyResponse) -> Response {
    let mut builder = Response::builder().status(response.status);
    if let Some(headers) = builder.headers_mut() {
        for (name, value) in response.headers.iter() {
            if !STRIP_HEADERS.contains(&name.as_str()) {
                headers.insert(name.clone(), value.clone());
            }
        }
    }
    builder
        .body(Body::from(response.body))
        .unwrap_or_else(|_| StatusCode::BAD_GATEWAY.into_response())
}

fn cached_response(cached: CachedResponse) -> Response {
    let mut builder = Response::builder().status(cached.status);
    if let Some(content_type) = &cached.content_type {
        builder = builder.header(header::CONTENT_TYPE, content_type);
    }
    builder = builder.header("x-gateway-cache", "hit");
    builder
        .body(Body::from(cached.body))
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}
