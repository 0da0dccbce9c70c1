use rand::Rng;
use std::time::Duration;
use thiserror::Error;

/// Decision returned by the retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Do not retry this failure.
    NoRetry,
    /// Retry after the given delay.
    RetryAfter(Duration),
}

/// Rejected policy parameters.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PolicyError {
    #[error("max_attempts must be at least 1")]
    ZeroAttempts,
    #[error("initial delay {initial:?} exceeds max delay {max:?}")]
    DelayOrder { initial: Duration, max: Duration },
    #[error("jitter must be within [0, 1], got {0}")]
    Jitter(f64),
}

/// Exponential backoff with a cap and symmetric jitter.
///
/// Fields are private so every policy in circulation has passed `new`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    max_attempts: u32,
    initial_delay: Duration,
    max_delay: Duration,
    jitter: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_delay: Duration::from_secs(5),
            max_delay: Duration::from_secs(30),
            jitter: 0.2,
        }
    }
}

impl RetryPolicy {
    pub fn new(
        max_attempts: u32,
        initial_delay: Duration,
        max_delay: Duration,
        jitter: f64,
    ) -> Result<Self, PolicyError> {
        if max_attempts == 0 {
            return Err(PolicyError::ZeroAttempts);
        }
        if initial_delay > max_delay {
            return Err(PolicyError::DelayOrder {
                initial: initial_delay,
                max: max_delay,
            });
        }
        if !(0.0..=1.0).contains(&jitter) {
            return Err(PolicyError::Jitter(jitter));
        }
        Ok(Self {
            max_attempts,
            initial_delay,
            max_delay,
            jitter,
        })
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn initial_delay(&self) -> Duration {
        self.initial_delay
    }

    pub fn max_delay(&self) -> Duration {
        self.max_delay
    }

    pub fn jitter(&self) -> f64 {
        self.jitter
    }

    /// Unjittered delay after a failed `attempt` (1-based):
    /// `initial_delay * 2^(attempt-1)`, capped at `max_delay`.
    pub fn base_delay(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(31);
        self.initial_delay
            .saturating_mul(1u32 << exp)
            .min(self.max_delay)
    }

    /// Perturb `base` by a factor drawn from `[1 - jitter, 1 + jitter]`,
    /// clamped to `[0, max_delay]`.
    pub fn jittered<R: Rng + ?Sized>(&self, base: Duration, rng: &mut R) -> Duration {
        if self.jitter == 0.0 {
            return base.min(self.max_delay);
        }
        let factor = 1.0 + rng.gen_range(-self.jitter..=self.jitter);
        let secs = (base.as_secs_f64() * factor).clamp(0.0, self.max_delay.as_secs_f64());
        Duration::from_secs_f64(secs)
    }

    /// Delay before the attempt following `attempt`. A server-provided delay
    /// replaces the exponential one; either way the result is at most `max_delay`.
    pub fn delay_for(&self, attempt: u32, server_delay: Option<Duration>) -> Duration {
        match server_delay {
            Some(d) => d.min(self.max_delay),
            None => self.jittered(self.base_delay(attempt), &mut rand::thread_rng()),
        }
    }

    /// Decide what to do after a failed `attempt` (1-based).
    pub fn decide(
        &self,
        attempt: u32,
        retryable: bool,
        server_delay: Option<Duration>,
    ) -> RetryDecision {
        if !retryable || attempt >= self.max_attempts {
            return RetryDecision::NoRetry;
        }
        RetryDecision::RetryAfter(self.delay_for(attempt, server_delay))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn policy(max_attempts: u32, initial_ms: u64, max_ms: u64, jitter: f64) -> RetryPolicy {
        RetryPolicy::new(
            max_attempts,
            Duration::from_millis(initial_ms),
            Duration::from_millis(max_ms),
            jitter,
        )
        .unwrap()
    }

    #[test]
    fn no_retry_when_not_retryable() {
        let p = RetryPolicy::default();
        assert_eq!(p.decide(1, false, None), RetryDecision::NoRetry);
    }

    #[test]
    fn exponential_backoff_grows_and_is_capped() {
        let p = policy(20, 100, 2_000, 0.0);
        let mut prev = Duration::ZERO;
        for attempt in 1..20 {
            let d = p.base_delay(attempt);
            assert!(d >= prev, "attempt {attempt}: {d:?} < {prev:?}");
            assert!(d <= p.max_delay());
            prev = d;
        }
        assert_eq!(p.base_delay(1), Duration::from_millis(100));
        assert_eq!(p.base_delay(2), Duration::from_millis(200));
        assert_eq!(p.base_delay(5), Duration::from_millis(1_600));
        assert_eq!(p.base_delay(6), Duration::from_millis(2_000));
        assert_eq!(p.base_delay(u32::MAX), Duration::from_millis(2_000));
    }

    #[test]
    fn respects_max_attempts() {
        let p = policy(3, 10, 100, 0.0);
        assert_eq!(
            p.decide(1, true, None),
            RetryDecision::RetryAfter(Duration::from_millis(10))
        );
        assert_eq!(
            p.decide(2, true, None),
            RetryDecision::RetryAfter(Duration::from_millis(20))
        );
        assert_eq!(p.decide(3, true, None), RetryDecision::NoRetry);
    }

    #[test]
    fn single_attempt_never_retries() {
        let p = policy(1, 10, 100, 0.2);
        assert_eq!(p.decide(1, true, None), RetryDecision::NoRetry);
    }

    #[test]
    fn jitter_stays_within_bounds() {
        let p = policy(5, 1_000, 1_100, 0.2);
        let mut rng = StdRng::seed_from_u64(7);
        let base = Duration::from_millis(1_000);
        for _ in 0..1_000 {
            let d = p.jittered(base, &mut rng);
            assert!(d >= Duration::from_millis(799), "{d:?}");
            // Upper jitter is clamped by max_delay.
            assert!(d <= Duration::from_millis(1_100), "{d:?}");
        }
    }

    #[test]
    fn server_delay_takes_precedence_and_is_clamped() {
        let p = policy(5, 100, 2_000, 0.2);
        assert_eq!(
            p.decide(1, true, Some(Duration::from_millis(750))),
            RetryDecision::RetryAfter(Duration::from_millis(750))
        );
        assert_eq!(
            p.decide(1, true, Some(Duration::from_secs(60))),
            RetryDecision::RetryAfter(Duration::from_millis(2_000))
        );
    }

    #[test]
    fn rejects_invalid_parameters() {
        let ms = Duration::from_millis;
        assert_eq!(
            RetryPolicy::new(0, ms(1), ms(2), 0.1),
            Err(PolicyError::ZeroAttempts)
        );
        assert_eq!(
            RetryPolicy::new(3, ms(5), ms(2), 0.1),
            Err(PolicyError::DelayOrder {
                initial: ms(5),
                max: ms(2)
            })
        );
        assert_eq!(RetryPolicy::new(3, ms(1), ms(2), 1.5), Err(PolicyError::Jitter(1.5)));
        assert!(RetryPolicy::new(3, ms(1), ms(1), 0.0).is_ok());
    }
}
