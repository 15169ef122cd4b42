//! Retry backoff for proxied calls.

use std::time::Duration;

/// Delay before the given retry attempt (1-based): `base * attempt`.
/// Attempt 0 is the initial call and carries no delay.
pub fn retry_delay(attempt: u32, base_ms: u64) -> Duration {
    Duration::from_millis(base_ms.saturating_mul(attempt as u64))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delay_scales_with_attempt() {
        assert_eq!(retry_delay(0, 1_000), Duration::from_millis(0));
        assert_eq!(retry_delay(1, 1_000), Duration::from_millis(1_000));
        assert_eq!(retry_delay(2, 1_000), Duration::from_millis(2_000));
    }
}
