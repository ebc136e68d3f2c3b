//! Request-budget enforcement for the Shortcut API.
//!
//! The documented limit is 200 requests per rolling 60-second window; the
//! bucket is configured a few requests below that to absorb clock skew
//! between this machine and the API's. When the budget is exhausted the
//! limiter blocks the (single) execution thread, up to a bounded maximum
//! wait; needing to wait longer than that is a fatal error, never a silent
//! drop.
//!
//! The bucket is an owned component injected into the API client, with the
//! clock abstracted so tests can drive it without real sleeps.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use crate::error::{MigrateError, Result};

/// Documented Shortcut API limit, requests per minute.
pub const MAX_REQUESTS_PER_MINUTE: usize = 200;

/// Headroom kept below the documented limit.
const HEADROOM: usize = 5;

/// Longest the limiter will block before giving up.
pub const MAX_DELAY: Duration = Duration::from_secs(70);

const WINDOW: Duration = Duration::from_secs(60);

/// Time source for the limiter.
pub trait Clock {
    fn now(&self) -> Instant;
    fn sleep(&self, duration: Duration);
}

/// Wall-clock time with real sleeps.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Token bucket over a rolling window.
#[derive(Debug)]
pub struct RateLimiter<C: Clock = SystemClock> {
    max_requests: usize,
    window: Duration,
    max_delay: Duration,
    stamps: VecDeque<Instant>,
    clock: C,
}

impl RateLimiter<SystemClock> {
    /// Limiter tuned for the Shortcut API.
    #[must_use]
    pub fn for_shortcut() -> Self {
        Self::new(
            MAX_REQUESTS_PER_MINUTE - HEADROOM,
            WINDOW,
            MAX_DELAY,
            SystemClock,
        )
    }
}

impl<C: Clock> RateLimiter<C> {
    #[must_use]
    pub fn new(max_requests: usize, window: Duration, max_delay: Duration, clock: C) -> Self {
        Self {
            max_requests,
            window,
            max_delay,
            stamps: VecDeque::with_capacity(max_requests),
            clock,
        }
    }

    /// Take one request token, blocking if the window is full.
    ///
    /// # Errors
    ///
    /// Returns `RateLimitExceeded` if the required wait would exceed the
    /// bounded maximum.
    pub fn acquire(&mut self) -> Result<()> {
        let mut now = self.clock.now();
        self.expire(now);

        if self.stamps.len() >= self.max_requests {
            // Oldest stamp leaves the window first.
            if let Some(&oldest) = self.stamps.front() {
                let wait = (oldest + self.window).saturating_duration_since(now);
                if wait > self.max_delay {
                    return Err(MigrateError::RateLimitExceeded {
                        needed_ms: u64::try_from(wait.as_millis()).unwrap_or(u64::MAX),
                        max_ms: u64::try_from(self.max_delay.as_millis()).unwrap_or(u64::MAX),
                    });
                }
                tracing::debug!(
                    wait_ms = u64::try_from(wait.as_millis()).unwrap_or(u64::MAX),
                    "rate limit reached, pausing"
                );
                self.clock.sleep(wait);
                now = self.clock.now();
                self.expire(now);
            }
        }

        self.stamps.push_back(now);
        Ok(())
    }

    fn expire(&mut self, now: Instant) {
        while let Some(front) = self.stamps.front() {
            if *front + self.window <= now {
                self.stamps.pop_front();
            } else {
                break;
            }
        }
    }
}
