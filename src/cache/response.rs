//! Response-cache conventions for idempotent reads.
//!
//! Cache key: `<service>:<JSON-serialized query params>`. Only successful
//! GET responses are cached, and paths on the exclusion list never are.

use axum::body::Bytes;
use serde_json::json;
use std::collections::BTreeMap;

/// A memoized backend response.
#[derive(Debug, Clone)]
pub struct CachedResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Bytes,
}

/// Build the cache key for a service + query-parameter set.
/// BTreeMap keeps key order deterministic across callers.
pub fn cache_key(service: &str, query: &BTreeMap<String, String>) -> String {
    format!("{}:{}", service, json!(query))
}

/// Whether this path is eligible for response caching.
pub fn is_cacheable_path(path: &str, exclude: &[String]) -> bool {
    !exclude.iter().any(|fragment| path.contains(fragment))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_key_deterministic() {
        let mut q1 = BTreeMap::new();
        q1.insert("page".to_string(), "2".to_string());
        q1.insert("limit".to_string(), "10".to_string());

        let mut q2 = BTreeMap::new();
        q2.insert("limit".to_string(), "10".to_string());
        q2.insert("page".to_string(), "2".to_string());

        assert_eq!(cache_key("users", &q1), cache_key("users", &q2));
        assert!(cache_key("users", &q1).starts_with("users:"));
    }

    #[test]
    fn test_excluded_paths_not_cacheable() {
        let exclude = vec!["/stats".to_string(), "/kpis".to_string()];
        assert!(is_cacheable_path("/api/users", &exclude));
        assert!(!is_cacheable_path("/api/leads/stats", &exclude));
        assert!(!is_cacheable_path("/api/billing/kpis/monthly", &exclude));
    }
}
