//! Fixed-window rate limiting per caller identity.

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use tokio::sync::broadcast;
use tokio::time;

use crate::config::schema::RateLimitConfig;
use crate::observability::metrics;

#[derive(Debug, Clone, Copy)]
struct RateWindow {
    count: u32,
    reset_at: Instant,
}

/// Fixed-window request counter per caller identity (e.g., IP).
#[derive(Debug)]
pub struct RateLimiter {
    windows: DashMap<String, RateWindow>,
    window: Duration,
    max_requests: u32,
    sweep_interval: Duration,
}

impl RateLimiter {
    pub fn new(config: &RateLimitConfig) -> Self {
        Self::with_settings(
            Duration::from_millis(config.window_ms),
            config.max_requests,
            Duration::from_secs(config.sweep_interval_secs),
        )
    }

    pub fn with_settings(window: Duration, max_requests: u32, sweep_interval: Duration) -> Self {
        Self {
            windows: DashMap::new(),
            window,
            max_requests,
            sweep_interval,
        }
    }

    /// Count this request against the identity's current window.
    /// Returns true when the window's limit is exceeded.
    pub fn is_rate_limited(&self, identity: &str) -> bool {
        let now = Instant::now();
        let mut window = self
            .windows
            .entry(identity.to_string())
            .or_insert(RateWindow {
                count: 0,
                reset_at: now + self.window,
            });

        if now > window.reset_at {
            window.count = 1;
            window.reset_at = now + self.window;
            return false;
        }

        window.count += 1;
        let limited = window.count > self.max_requests;
        if limited {
            metrics::record_rate_limited("window_limit");
        }
        limited
    }

    /// Requests left in the identity's current window.
    pub fn remaining(&self, identity: &str) -> u32 {
        let now = Instant::now();
        match self.windows.get(identity) {
            Some(w) if now <= w.reset_at => self.max_requests.saturating_sub(w.count),
            _ => self.max_requests,
        }
    }

    /// When the identity's current window resets, if one exists.
    pub fn reset_time(&self, identity: &str) -> Option<Instant> {
        self.windows.get(identity).map(|w| w.reset_at)
    }

    /// Remove expired windows.
    pub fn sweep(&self) {
        let now = Instant::now();
        self.windows.retain(|_, w| now <= w.reset_at);
    }

    /// Run the periodic cleanup until shutdown is signaled.
    pub async fn run_sweeper(self: Arc<Self>, mut shutdown: broadcast::Receiver<()>) {
        let mut ticker = time::interval(self.sweep_interval);
        ticker.tick().await;
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.sweep();
                }
                _ = shutdown.recv() => {
                    tracing::debug!("Rate limiter sweeper stopping");
                    break;
                }
            }
        }
    }
}
