//! Minimum-interval request pacing for lookup sources.
//!
//! Each source owns a [`RateLimiter`] shared by every key that queries it,
//! so a batch of thousands of keys still hits a given service at most
//! `requests_per_second` times per second.
//!
//! The limiter holds its lock across the wait. Two callers racing on
//! [`RateLimiter::acquire`] are therefore serialized: the second one only
//! starts measuring once the first has recorded its timestamp.
//!
//! Time is read from [`tokio::time::Instant`], which lets tests drive the
//! limiter with a paused runtime clock.

use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

/// Enforces a minimum interval between permitted requests.
#[derive(Debug)]
pub struct RateLimiter {
    interval: Duration,
    last_permit: Mutex<Option<Instant>>,
}

impl RateLimiter {
    /// Create a limiter permitting one request per `interval`.
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_permit: Mutex::new(None),
        }
    }

    /// Create a limiter from a requests-per-second rate.
    ///
    /// Returns `None` when `requests_per_second` is zero, negative, not
    /// finite, or so small that the interval overflows a [`Duration`],
    /// meaning "do not rate limit". Configuration validation rejects the
    /// last case before it gets here.
    pub fn per_second(requests_per_second: f64) -> Option<Self> {
        if !requests_per_second.is_finite() || requests_per_second <= 0.0 {
            return None;
        }
        Duration::try_from_secs_f64(1.0 / requests_per_second)
            .ok()
            .map(Self::new)
    }

    /// The minimum spacing between two permitted requests.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Wait until a request is permitted, then record the permit time.
    pub async fn acquire(&self) {
        let mut last = self.last_permit.lock().await;
        if let Some(previous) = *last {
            let ready_at = previous + self.interval;
            if Instant::now() < ready_at {
                tokio::time::sleep_until(ready_at).await;
            }
        }
        *last = Some(Instant::now());
    }
}
