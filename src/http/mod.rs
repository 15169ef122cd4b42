//! HTTP surface of the gateway.
//!
//! # Data Flow
//! ```text
//! inbound request
//!     → rate limiter (429 on exceed)
//!     → validator (400/413 on reject)
//!     → route table (404 on miss)
//!     → response cache (GET only)
//!     → ProxyService
//! WS upgrade at the fixed endpoint → ws::WsGateway
//! ```

pub mod server;

pub use server::{AppState, HttpServer};
