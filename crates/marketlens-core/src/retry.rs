//! Retry policy with exponential backoff, independent of any I/O.
//!
//! The policy only answers two questions: is this status a throttle, and how
//! long to wait after a given throttled attempt. Waiting itself goes through a
//! [`Sleeper`] so callers can substitute a recording implementation in tests.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

/// Exponential backoff for retrying throttled requests.
///
/// The delay after attempt `k` is `base * factor^k`, capped at `max`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Backoff {
    /// The base backoff duration.
    pub base: Duration,
    /// The multiplicative factor for each subsequent retry.
    pub factor: f64,
    /// The maximum duration to wait between retries.
    pub max: Duration,
    /// Whether to apply random jitter (+/- 50%) to the delay.
    pub jitter: bool,
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            base: Duration::from_secs(1),
            factor: 2.0,
            max: Duration::from_secs(600),
            jitter: false,
        }
    }
}

impl Backoff {
    pub fn exponential(base: Duration) -> Self {
        Self {
            base,
            ..Self::default()
        }
    }

    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    /// Calculate the delay for a given attempt number.
    pub fn delay(self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let seconds = self.base.as_secs_f64() * self.factor.powi(exponent);
        let capped_seconds = if seconds.is_finite() {
            seconds.min(self.max.as_secs_f64())
        } else {
            self.max.as_secs_f64()
        };

        let delay = Duration::from_secs_f64(capped_seconds);
        if !self.jitter {
            return delay;
        }

        let jitter_ms = (delay.as_millis() as f64 * 0.5) as u64;
        let random_offset = fastrand::u64(0..=(jitter_ms * 2));
        let total_ms = delay.as_millis() as i64 + (random_offset as i64 - jitter_ms as i64);
        Duration::from_millis(total_ms.max(0) as u64)
    }
}

/// Bounded retry policy applied by [`crate::RateLimitedClient`].
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts including the first one. Always at least 1.
    pub max_attempts: u32,
    /// The backoff strategy to use between retries.
    pub backoff: Backoff,
    /// Statuses treated as throttling. Every other non-2xx status is terminal.
    pub throttle_statuses: Vec<u16>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Backoff::default(),
            throttle_statuses: vec![429],
        }
    }
}

impl RetryPolicy {
    /// Exponential policy: after throttled attempt `k` wait `base * 2^k`.
    pub fn exponential(max_attempts: u32, base: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff: Backoff::exponential(base),
            ..Self::default()
        }
    }

    /// A single attempt, no retries.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    pub fn is_throttle(&self, status: u16) -> bool {
        self.throttle_statuses.contains(&status)
    }

    /// Delay to wait after the given throttled attempt (1-based), or `None`
    /// when the ceiling has been reached.
    pub fn delay_after_attempt(&self, attempt: u32) -> Option<Duration> {
        if attempt >= self.max_attempts {
            return None;
        }
        Some(self.backoff.delay(attempt))
    }
}

/// Suspends the current task. Injected so retry timing is observable in tests.
pub trait Sleeper: Send + Sync {
    fn sleep<'a>(&'a self, duration: Duration) -> Pin<Box<dyn Future<Output = ()> + Send + 'a>>;
}

/// Sleeper backed by the tokio timer.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioSleeper;

impl Sleeper for TokioSleeper {
    fn sleep<'a>(&'a self, duration: Duration) -> Pin<Box<dyn Future<Output = ()> + Send + 'a>> {
        Box::pin(tokio::time::sleep(duration))
    }
}
