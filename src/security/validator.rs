//! Stateless structural/security checks on inbound requests.
//!
//! Checks run in a fixed order and the first failure wins:
//! declared body size, traversal sequences, path length, injection
//! patterns. All rejections happen before any proxying is attempted.

use crate::config::schema::ValidationConfig;
use crate::error::ValidationError;

/// Path fragments rejected as injection attempts.
const DENY_PATTERNS: &[&str] = &[
    "<",
    ">",
    "'",
    "\"",
    "`",
    "javascript:",
    "data:",
    "vbscript:",
];

/// Structural validator for inbound requests.
#[derive(Debug, Clone)]
pub struct RequestValidator {
    max_body_bytes: u64,
    max_path_length: usize,
}

impl RequestValidator {
    pub fn new(config: &ValidationConfig) -> Self {
        Self {
            max_body_bytes: config.max_body_bytes,
            max_path_length: config.max_path_length,
        }
    }

    /// Validate a request's path and declared content length.
    pub fn validate(
        &self,
        path: &str,
        content_length: Option<u64>,
    ) -> Result<(), ValidationError> {
        if let Some(declared) = content_length {
            if declared > self.max_body_bytes {
                return Err(ValidationError::PayloadTooLarge {
                    declared,
                    max: self.max_body_bytes,
                });
            }
        }

        if path.contains("..") || path.contains("//") {
            return Err(ValidationError::InvalidPath {
                reason: "traversal sequence".to_string(),
            });
        }

        if path.len() > self.max_path_length {
            return Err(ValidationError::InvalidPath {
                reason: format!("length {} exceeds {}", path.len(), self.max_path_length),
            });
        }

        for pattern in DENY_PATTERNS {
            if path.contains(pattern) {
                return Err(ValidationError::InvalidFormat {
                    pattern: (*pattern).to_string(),
                });
            }
        }

        Ok(())
    }
}

impl Default for RequestValidator {
    fn default() -> Self {
        Self::new(&ValidationConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_path_passes() {
        let v = RequestValidator::default();
        assert!(v.validate("/api/users/42", Some(1024)).is_ok());
    }

    #[test]
    fn test_traversal_rejected() {
        let v = RequestValidator::default();
        let err = v.validate("/users/../../etc/passwd", None).unwrap_err();
        assert!(matches!(err, ValidationError::InvalidPath { .. }));

        let err = v.validate("/users//admin", None).unwrap_err();
        assert!(matches!(err, ValidationError::InvalidPath { .. }));
    }

    #[test]
    fn test_oversized_payload_rejected() {
        let v = RequestValidator::default();
        let err = v
            .validate("/api/users", Some(11 * 1024 * 1024))
            .unwrap_err();
        assert_eq!(
            err,
            ValidationError::PayloadTooLarge {
                declared: 11 * 1024 * 1024,
                max: 10 * 1024 * 1024,
            }
        );
    }

    #[test]
    fn test_size_checked_before_path() {
        // First failing check determines the error
        let v = RequestValidator::default();
        let err = v
            .validate("/users/../x", Some(11 * 1024 * 1024))
            .unwrap_err();
        assert!(matches!(err, ValidationError::PayloadTooLarge { .. }));
    }

    #[test]
    fn test_overlong_path_rejected() {
        let v = RequestValidator::default();
        let path = format!("/{}", "a".repeat(2100));
        let err = v.validate(&path, None).unwrap_err();
        assert!(matches!(err, ValidationError::InvalidPath { .. }));
    }

    #[test]
    fn test_injection_patterns_rejected() {
        let v = RequestValidator::default();
        for path in [
            "/api/<script>",
            "/api/javascript:alert(1)",
            "/api/data:text",
            "/api/vbscript:x",
            "/api/'quote",
        ] {
            let err = v.validate(path, None).unwrap_err();
            assert!(
                matches!(err, ValidationError::InvalidFormat { .. }),
                "expected InvalidFormat for {}",
                path
            );
        }
    }
}
