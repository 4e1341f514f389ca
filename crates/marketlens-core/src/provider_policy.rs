use std::fmt::{Display, Formatter};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::retry::RetryPolicy;
use crate::throttling::Pacer;

/// The four upstreams the pipeline talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Fundamentals,
    News,
    Discussions,
    Bars,
}

impl SourceKind {
    pub const ALL: [Self; 4] = [Self::Fundamentals, Self::News, Self::Discussions, Self::Bars];

    /// Provider name used in log fields and error messages.
    pub const fn provider(self) -> &'static str {
        match self {
            Self::Fundamentals => "finnhub",
            Self::News => "newsapi",
            Self::Discussions => "reddit",
            Self::Bars => "alpaca",
        }
    }
}

impl Display for SourceKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.provider())
    }
}

/// Retry, pacing and result-size settings for one upstream.
#[derive(Debug, Clone, PartialEq)]
pub struct SourcePolicy {
    pub kind: SourceKind,
    pub retry: RetryPolicy,
    /// Minimum spacing between consecutive calls. Zero disables pacing.
    pub inter_call_delay: Duration,
    /// Upper bound on documents requested per query.
    pub result_cap: usize,
}

impl SourcePolicy {
    /// Fundamentals tolerate long throttle windows: 30 s base, 1 s pacing.
    pub fn fundamentals_default() -> Self {
        Self {
            kind: SourceKind::Fundamentals,
            retry: RetryPolicy::exponential(3, Duration::from_secs(30)),
            inter_call_delay: Duration::from_secs(1),
            result_cap: 1,
        }
    }

    pub fn news_default() -> Self {
        Self {
            kind: SourceKind::News,
            retry: RetryPolicy::exponential(4, Duration::from_secs(1)),
            inter_call_delay: Duration::from_secs(1),
            result_cap: 5,
        }
    }

    pub fn discussions_default() -> Self {
        Self {
            kind: SourceKind::Discussions,
            retry: RetryPolicy::exponential(3, Duration::from_secs(2)),
            inter_call_delay: Duration::from_secs(2),
            result_cap: 5,
        }
    }

    pub fn bars_default() -> Self {
        Self {
            kind: SourceKind::Bars,
            retry: RetryPolicy::exponential(3, Duration::from_secs(1)),
            inter_call_delay: Duration::ZERO,
            result_cap: usize::MAX,
        }
    }

    pub fn default_for(kind: SourceKind) -> Self {
        match kind {
            SourceKind::Fundamentals => Self::fundamentals_default(),
            SourceKind::News => Self::news_default(),
            SourceKind::Discussions => Self::discussions_default(),
            SourceKind::Bars => Self::bars_default(),
        }
    }

    /// Multiplies the retry base delay and the pacing interval, e.g. `0.0`
    /// for dry runs against local fixtures.
    pub fn scaled(mut self, factor: f64) -> Self {
        let factor = if factor.is_finite() { factor.max(0.0) } else { 1.0 };
        self.inter_call_delay = self.inter_call_delay.mul_f64(factor);
        self.retry.backoff.base = self.retry.backoff.base.mul_f64(factor);
        self
    }

    /// Spreads throttle retries randomly around each backoff delay.
    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.retry.backoff = self.retry.backoff.with_jitter(jitter);
        self
    }

    pub fn pacer(&self) -> Pacer {
        Pacer::new(self.inter_call_delay)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fundamentals_policy_waits_long_on_throttle() {
        let policy = SourcePolicy::fundamentals_default();

        assert_eq!(policy.retry.max_attempts, 3);
        assert_eq!(
            policy.retry.delay_after_attempt(1),
            Some(Duration::from_secs(60))
        );
        assert_eq!(policy.inter_call_delay, Duration::from_secs(1));
    }

    #[test]
    fn document_sources_cap_results_at_five() {
        assert_eq!(SourcePolicy::news_default().result_cap, 5);
        assert_eq!(SourcePolicy::news_default().retry.max_attempts, 4);
        assert_eq!(SourcePolicy::discussions_default().result_cap, 5);
        assert_eq!(
            SourcePolicy::discussions_default().inter_call_delay,
            Duration::from_secs(2)
        );
    }

    #[test]
    fn bars_are_not_paced() {
        let policy = SourcePolicy::bars_default();

        assert!(!policy.pacer().is_enabled());
    }

    #[test]
    fn scaling_to_zero_removes_all_waiting() {
        let policy = SourcePolicy::discussions_default().scaled(0.0);

        assert_eq!(policy.inter_call_delay, Duration::ZERO);
        assert_eq!(policy.retry.delay_after_attempt(1), Some(Duration::ZERO));
        assert_eq!(policy.retry.max_attempts, 3);
    }

    #[test]
    fn jitter_keeps_scaled_delays_in_band() {
        let policy = SourcePolicy::news_default().scaled(0.5).with_jitter(true);

        assert!(policy.retry.backoff.jitter);
        for _ in 0..20 {
            let delay = policy
                .retry
                .delay_after_attempt(1)
                .expect("retry allowed")
                .as_millis();
            assert!((500..=1500).contains(&delay), "delay_ms={delay}");
        }
    }

    #[test]
    fn default_for_matches_named_constructors() {
        for kind in SourceKind::ALL {
            assert_eq!(SourcePolicy::default_for(kind).kind, kind);
        }
        assert_eq!(SourceKind::Bars.to_string(), "alpaca");
    }
}
