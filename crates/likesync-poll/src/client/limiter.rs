//! Sliding-window rate limiting for API channels.
//!
//! The Integration API enforces separate request-rate ceilings for query and
//! command operations. The limiter delays callers instead of refusing them:
//! [`RateLimiter::acquire`] resolves once a slot is free in the current
//! window, so a burst of work spreads out over time rather than erroring.

use std::time::Duration;

use metrics::histogram;
use parking_lot::Mutex;
use tokio::time::Instant;

/// A request-rate ceiling: at most `max_requests` per `window`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimit {
    /// Maximum number of requests inside one window.
    pub max_requests: usize,

    /// Length of the sliding window.
    pub window: Duration,
}

impl RateLimit {
    /// Create a new rate limit.
    pub const fn new(max_requests: usize, window: Duration) -> Self {
        Self {
            max_requests,
            window,
        }
    }
}

/// Sliding-window rate limiter for one API channel.
///
/// Thread-safe: the recent-request log is protected by a mutex, so requests
/// may be dispatched from concurrent tasks.
pub struct RateLimiter {
    /// Channel name, used in logs and metric labels.
    channel: &'static str,
    limit: RateLimit,
    /// Timestamps of requests inside the current window, oldest first.
    recent: Mutex<Vec<Instant>>,
}

impl RateLimiter {
    /// Create a limiter for the given channel and ceiling.
    pub fn new(channel: &'static str, limit: RateLimit) -> Self {
        debug_assert!(limit.max_requests > 0, "rate limit must allow requests");
        Self {
            channel,
            limit,
            recent: Mutex::new(Vec::new()),
        }
    }

    /// The configured ceiling.
    pub fn limit(&self) -> RateLimit {
        self.limit
    }

    /// Wait until a request slot is free, then claim it.
    pub async fn acquire(&self) {
        let started = Instant::now();

        loop {
            let wait = {
                let mut recent = self.recent.lock();
                let now = Instant::now();
                recent.retain(|t| now.duration_since(*t) < self.limit.window);

                if recent.len() < self.limit.max_requests {
                    recent.push(now);
                    None
                } else {
                    // The oldest entry leaving the window frees the next slot.
                    Some(self.limit.window - now.duration_since(recent[0]))
                }
            };

            match wait {
                None => break,
                Some(delay) => tokio::time::sleep(delay).await,
            }
        }

        let waited = started.elapsed();
        if !waited.is_zero() {
            tracing::debug!(
                channel = self.channel,
                waited_ms = waited.as_millis() as u64,
                "rate limit delayed request"
            );
            histogram!("rate_limit_wait_seconds", "channel" => self.channel)
                .record(waited.as_secs_f64());
        }
    }
}
