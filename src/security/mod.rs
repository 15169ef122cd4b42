//! Pre-proxy request protection.
//!
//! # Components
//! - `validator`: stateless structural/security checks
//! - `rate_limit`: fixed-window counter per caller identity
//!
//! Both run before any proxying is attempted and are never retried.

pub mod rate_limit;
pub mod validator;

pub use rate_limit::RateLimiter;
pub use validator::RequestValidator;
