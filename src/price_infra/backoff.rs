use std::sync::Arc;
use std::time::Duration;
use rand::Rng;
use crate::config::BackoffConfig;

/// Source of the random component added to each backoff delay.
pub trait JitterSource: Send + Sync {
    /// Uniform sample in `[0, bound]`.
    fn sample(&self, bound: Duration) -> Duration;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct ThreadRngJitter;

impl JitterSource for ThreadRngJitter {
    fn sample(&self, bound: Duration) -> Duration {
        let max = bound.as_millis().min(u64::MAX as u128) as u64;
        if max == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rand::thread_rng().gen_range(0..=max))
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct NoJitter;

impl JitterSource for NoJitter {
    fn sample(&self, _bound: Duration) -> Duration {
        Duration::ZERO
    }
}

/// Always returns the given fraction of the bound.
#[derive(Clone, Copy, Debug)]
pub struct FixedJitter(pub f64);

impl JitterSource for FixedJitter {
    fn sample(&self, bound: Duration) -> Duration {
        bound.mul_f64(self.0.clamp(0.0, 1.0))
    }
}

/// `min(base * 2^attempt, max_delay) + U[0, jitter]`, attempt counted from 0.
#[derive(Clone)]
pub struct BackoffPolicy {
    base_delay: Duration,
    max_delay: Duration,
    jitter: Duration,
    jitter_source: Arc<dyn JitterSource>,
}

impl BackoffPolicy {
    pub fn new(base_delay: Duration, max_delay: Duration, jitter: Duration) -> Self {
        Self::with_jitter_source(base_delay, max_delay, jitter, Arc::new(ThreadRngJitter))
    }

    pub fn with_jitter_source(
        base_delay: Duration,
        max_delay: Duration,
        jitter: Duration,
        jitter_source: Arc<dyn JitterSource>,
    ) -> Self {
        BackoffPolicy {
            base_delay,
            max_delay,
            jitter,
            jitter_source,
        }
    }

    pub fn from_config(config: &BackoffConfig) -> Self {
        Self::new(
            Duration::from_millis(config.base_delay_ms),
            Duration::from_millis(config.max_delay_ms),
            Duration::from_millis(config.jitter_ms),
        )
    }

    /// Delay before retry number `attempt`.
    pub fn delay(&self, attempt: u32) -> Duration {
        let jitter = self.jitter_source.sample(self.jitter).min(self.jitter);
        self.capped_delay(attempt).saturating_add(jitter)
    }

    /// Deterministic part of the delay, without jitter.
    pub fn capped_delay(&self, attempt: u32) -> Duration {
        let multiplier = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.base_delay
            .checked_mul(multiplier)
            .unwrap_or(Duration::MAX)
            .min(self.max_delay)
    }

    pub fn jitter_bound(&self) -> Duration {
        self.jitter
    }
}

impl std::fmt::Debug for BackoffPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackoffPolicy")
            .field("base_delay", &self.base_delay)
            .field("max_delay", &self.max_delay)
            .field("jitter", &self.jitter)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn policy(jitter_source: Arc<dyn JitterSource>) -> BackoffPolicy {
        BackoffPolicy::with_jitter_source(
            Duration::from_millis(100),
            Duration::from_millis(1_000),
            Duration::from_millis(50),
            jitter_source,
        )
    }

    #[test]
    fn doubles_until_cap() {
        let policy = policy(Arc::new(NoJitter));
        assert_eq!(policy.delay(0), Duration::from_millis(100));
        assert_eq!(policy.delay(1), Duration::from_millis(200));
        assert_eq!(policy.delay(2), Duration::from_millis(400));
        assert_eq!(policy.delay(3), Duration::from_millis(800));
        assert_eq!(policy.delay(4), Duration::from_millis(1_000));
        assert_eq!(policy.delay(40), Duration::from_millis(1_000));
    }

    #[test]
    fn jitter_is_added_on_top_of_cap() {
        let policy = policy(Arc::new(FixedJitter(1.0)));
        assert_eq!(policy.delay(0), Duration::from_millis(150));
        assert_eq!(policy.delay(10), Duration::from_millis(1_050));
    }

    #[test]
    fn huge_attempt_saturates() {
        let policy = BackoffPolicy::with_jitter_source(
            Duration::from_secs(1),
            Duration::MAX,
            Duration::ZERO,
            Arc::new(NoJitter),
        );
        assert_eq!(policy.delay(u32::MAX), Duration::MAX);
    }

    proptest! {
        #[test]
        fn delay_within_bounds(
            base_ms in 1u64..5_000,
            extra_ms in 0u64..60_000,
            jitter_ms in 0u64..2_000,
            attempt in 0u32..64,
        ) {
            let base = Duration::from_millis(base_ms);
            let max = Duration::from_millis(base_ms + extra_ms);
            let jitter = Duration::from_millis(jitter_ms);
            let policy = BackoffPolicy::new(base, max, jitter);

            let floor = base
                .checked_mul(1u32.checked_shl(attempt).unwrap_or(u32::MAX))
                .unwrap_or(Duration::MAX)
                .min(max);
            let delay = policy.delay(attempt);

            prop_assert!(delay >= floor);
            prop_assert!(delay <= floor + jitter);
        }

        #[test]
        fn capped_delay_is_non_decreasing(
            base_ms in 1u64..5_000,
            extra_ms in 0u64..60_000,
            attempt in 0u32..63,
        ) {
            let policy = BackoffPolicy::with_jitter_source(
                Duration::from_millis(base_ms),
                Duration::from_millis(base_ms + extra_ms),
                Duration::ZERO,
                Arc::new(NoJitter),
            );
            prop_assert!(policy.delay(attempt) <= policy.delay(attempt + 1));
        }
    }
}
