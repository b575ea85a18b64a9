//! Fixed-spacing rate limiting.
//!
//! Guarantees a minimum gap between call *starts*. This is a bucket of size one,
//! not a sliding window counter.

use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::{sleep, Instant};

#[derive(Debug)]
pub struct IntervalLimiter {
    interval: Duration,
    next: Instant,
}

impl IntervalLimiter {
    pub fn new(interval: Duration) -> Self {
        Self::new_at(interval, Instant::now())
    }

    /// A limiter whose first slot opens at `now`.
    pub fn new_at(interval: Duration, now: Instant) -> Self {
        Self {
            interval,
            next: now,
        }
    }

    /// True when a reservation at `now` would not wait.
    pub fn is_idle_at(&self, now: Instant) -> bool {
        now >= self.next
    }

    /// Reserve the next slot and return the wait duration required before executing.
    pub fn reserve(&mut self) -> Duration {
        self.reserve_at(Instant::now())
    }

    /// Same as [`reserve`](Self::reserve) with an explicit clock reading.
    ///
    /// The slot is stamped with the moment the caller will dispatch, so a slow
    /// call does not push the following slot further out.
    pub fn reserve_at(&mut self, now: Instant) -> Duration {
        let start = if now >= self.next { now } else { self.next };
        self.next = start + self.interval;
        start.saturating_duration_since(now)
    }
}

/// Shared, process-wide spacing gate.
///
/// The read/compare/write of the reserved slot happens under one lock; the
/// wait itself happens after the lock is released so only the calling task
/// is suspended.
#[derive(Debug)]
pub struct MinIntervalGate {
    limiter: Mutex<IntervalLimiter>,
}

impl MinIntervalGate {
    pub fn new(interval: Duration) -> Self {
        Self {
            limiter: Mutex::new(IntervalLimiter::new(interval)),
        }
    }

    /// `min_interval = 60s / max_per_minute`. Zero is treated as one.
    pub fn per_minute(max_per_minute: u32) -> Self {
        let per_minute = max_per_minute.max(1);
        Self::new(Duration::from_secs(60) / per_minute)
    }

    /// Wait until the caller may start. Returns how long it waited.
    pub async fn acquire(&self) -> Duration {
        let wait = { self.limiter.lock().await.reserve() };
        if wait > Duration::ZERO {
            tracing::info!(
                "Rate limit reached. Waiting for {:.2} seconds",
                wait.as_secs_f64()
            );
            sleep(wait).await;
        }
        wait
    }
}
