use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use governor::clock::DefaultClock;
use governor::state::direct::NotKeyed;
use governor::state::InMemoryState;
use governor::{Quota, RateLimiter};

type DirectRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Minimum spacing between consecutive calls to one upstream.
///
/// Cloned pacers share the same token bucket, so concurrent workers of a stage
/// still respect a single per-source interval. A zero interval disables pacing.
#[derive(Clone)]
pub struct Pacer {
    limiter: Option<Arc<DirectRateLimiter>>,
    interval: Duration,
}

impl Pacer {
    pub fn new(interval: Duration) -> Self {
        let limiter = quota_from_interval(interval).map(|quota| Arc::new(RateLimiter::direct(quota)));
        Self { limiter, interval }
    }

    pub fn disabled() -> Self {
        Self {
            limiter: None,
            interval: Duration::ZERO,
        }
    }

    pub const fn is_enabled(&self) -> bool {
        self.limiter.is_some()
    }

    /// Waits until the next call may be issued. The first call never waits.
    pub async fn ready(&self) {
        if let Some(limiter) = &self.limiter {
            limiter.until_ready().await;
        }
    }
}

impl std::fmt::Debug for Pacer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pacer")
            .field("interval", &self.interval)
            .field("enabled", &self.is_enabled())
            .finish()
    }
}

fn quota_from_interval(interval: Duration) -> Option<Quota> {
    let burst = NonZeroU32::MIN;
    Quota::with_period(interval).map(|quota| quota.allow_burst(burst))
}
