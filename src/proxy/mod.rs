//! HTTP forwarding subsystem.
//!
//! # Data Flow
//! ```text
//! routing layer
//!     → ProxyService::proxy_request(service, path, request)
//!     → registry lookup → circuit gate → instance selection
//!     → outbound call (timeout, retry w/ backoff)
//!     → breaker outcome recorded exactly once
//!     → ProxyResponse or GatewayError
//! ```

pub mod service;

pub use service::{ProxyRequest, ProxyResponse, ProxyService};
