//! Semantic validation of a deserialized configuration.
//!
//! Syntactic problems are caught by serde; this pass catches the mistakes a
//! well-formed file can still contain. A route referencing an unregistered
//! service is fatal here, at startup, never at request time.

use std::collections::HashSet;
use url::Url;

use crate::config::schema::GatewayConfig;

/// A single semantic problem found in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    DuplicateService(String),
    InvalidUrl { service: String, url: String },
    UnknownRouteService { prefix: String, service: String },
    ZeroThreshold(&'static str),
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationError::DuplicateService(name) => {
                write!(f, "duplicate service name '{}'", name)
            }
            ValidationError::InvalidUrl { service, url } => {
                write!(f, "service '{}' has invalid URL '{}'", service, url)
            }
            ValidationError::UnknownRouteService { prefix, service } => {
                write!(
                    f,
                    "route '{}' references unregistered service '{}'",
                    prefix, service
                )
            }
            ValidationError::ZeroThreshold(field) => {
                write!(f, "{} must be greater than zero", field)
            }
        }
    }
}

/// Validate a configuration, collecting all problems rather than stopping
/// at the first.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();
    let mut names: HashSet<&str> = HashSet::new();

    for service in &config.services {
        if !names.insert(service.name.as_str()) {
            errors.push(ValidationError::DuplicateService(service.name.clone()));
        }
        if Url::parse(&service.base_url).is_err() {
            errors.push(ValidationError::InvalidUrl {
                service: service.name.clone(),
                url: service.base_url.clone(),
            });
        }
        for replica in &service.replicas {
            if Url::parse(&replica.base_url).is_err() {
                errors.push(ValidationError::InvalidUrl {
                    service: service.name.clone(),
                    url: replica.base_url.clone(),
                });
            }
        }
    }

    for route in &config.routes {
        if !names.contains(route.service.as_str()) {
            errors.push(ValidationError::UnknownRouteService {
                prefix: route.prefix.clone(),
                service: route.service.clone(),
            });
        }
    }

    if config.circuit_breaker.failure_threshold == 0 {
        errors.push(ValidationError::ZeroThreshold("circuit_breaker.failure_threshold"));
    }
    if config.rate_limit.max_requests == 0 {
        errors.push(ValidationError::ZeroThreshold("rate_limit.max_requests"));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
