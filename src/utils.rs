//! Backoff helpers shared by the queue and the worker loop.

use crate::config::{BackoffStrategy, RetryPolicy};
use rand::Rng;
use std::time::Duration;

/// Delay before a failed job becomes claimable again.
///
/// `attempts` is the number of executions already consumed. The returned
/// delay follows the policy's strategy, capped at `max_delay_ms`, and is
/// deterministic so delays never shrink between consecutive failures.
pub fn retry_delay(policy: &RetryPolicy, attempts: u32) -> Duration {
    let base = policy.base_delay_ms as f64;
    let raw_ms = match &policy.backoff_strategy {
        BackoffStrategy::Fixed => base,
        BackoffStrategy::Linear { increment_ms } => {
            base + attempts as f64 * *increment_ms as f64
        }
        BackoffStrategy::Exponential { multiplier } => base * multiplier.powi(attempts as i32),
    };

    // powi can overflow to infinity for large attempt counts; min() with the
    // cap keeps the result finite.
    let capped_ms = raw_ms.min(policy.max_delay_ms as f64).max(0.0);
    Duration::from_millis(capped_ms as u64)
}

/// Jittered backoff for a worker that found nothing to claim or hit a
/// transient store error.
///
/// Doubles with each consecutive unproductive poll, capped at `max`, with
/// a 10% random spread so a pool of workers does not poll in lockstep.
pub fn poll_backoff(consecutive_polls: u32, base: Duration, max: Duration) -> Duration {
    let exponent = consecutive_polls.min(16);
    let raw = base.saturating_mul(2u32.saturating_pow(exponent));
    let capped = raw.min(max);

    let factor = rand::thread_rng().gen_range(0.9..=1.1);
    capped.mul_f64(factor)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_delay_ignores_attempts() {
        let policy = RetryPolicy::fixed(3, 500);
        assert_eq!(retry_delay(&policy, 0), Duration::from_millis(500));
        assert_eq!(retry_delay(&policy, 10), Duration::from_millis(500));
    }

    #[test]
    fn linear_delay_grows_by_increment() {
        let policy = RetryPolicy {
            base_delay_ms: 1000,
            max_delay_ms: 60_000,
            backoff_strategy: BackoffStrategy::Linear { increment_ms: 1000 },
            ..Default::default()
        };
        assert_eq!(retry_delay(&policy, 0), Duration::from_millis(1000));
        assert_eq!(retry_delay(&policy, 1), Duration::from_millis(2000));
        assert_eq!(retry_delay(&policy, 3), Duration::from_millis(4000));
    }

    #[test]
    fn exponential_delay_doubles_and_caps() {
        let policy = RetryPolicy {
            base_delay_ms: 1000,
            max_delay_ms: 8000,
            backoff_strategy: BackoffStrategy::Exponential { multiplier: 2.0 },
            ..Default::default()
        };
        assert_eq!(retry_delay(&policy, 0), Duration::from_millis(1000));
        assert_eq!(retry_delay(&policy, 1), Duration::from_millis(2000));
        assert_eq!(retry_delay(&policy, 2), Duration::from_millis(4000));
        assert_eq!(retry_delay(&policy, 3), Duration::from_millis(8000));
        assert_eq!(retry_delay(&policy, 4), Duration::from_millis(8000));
    }

    #[test]
    fn delays_never_decrease_up_to_cap() {
        let policy = RetryPolicy::default();
        let mut previous = Duration::ZERO;
        for attempts in 0..32 {
            let delay = retry_delay(&policy, attempts);
            assert!(delay >= previous, "delay shrank at attempt {attempts}");
            assert!(delay <= Duration::from_millis(policy.max_delay_ms));
            previous = delay;
        }
    }

    #[test]
    fn huge_attempt_counts_stay_at_cap() {
        let policy = RetryPolicy::default();
        assert_eq!(
            retry_delay(&policy, u32::MAX),
            Duration::from_millis(policy.max_delay_ms)
        );
    }

    #[test]
    fn poll_backoff_stays_within_jitter_bounds() {
        let base = Duration::from_millis(100);
        let max = Duration::from_secs(5);
        for polls in 0..20 {
            let delay = poll_backoff(polls, base, max);
            assert!(delay >= base.mul_f64(0.9));
            assert!(delay <= max.mul_f64(1.1));
        }
    }

    #[test]
    fn poll_backoff_grows_with_consecutive_polls() {
        let base = Duration::from_millis(100);
        let max = Duration::from_secs(60);
        // Compare against worst-case jitter on the smaller value.
        let early = poll_backoff(0, base, max);
        let late = poll_backoff(8, base, max);
        assert!(late > early);
    }
}
