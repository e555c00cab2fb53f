use std::time::Duration;

/// Upper bound on a single backoff sleep.
pub const MAX_DELAY: Duration = Duration::from_secs(15 * 60);

/// Bounded exponential backoff around one remote call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(10),
            multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration, multiplier: f64) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            multiplier,
        }
    }

    /// Sleep after failed attempt number `attempt` (1-based), or `None` once
    /// the attempts are used up. Delays never exceed [`MAX_DELAY`].
    ///
    /// ```
    /// use adlabel_pipeline::retry::RetryPolicy;
    /// use std::time::Duration;
    ///
    /// let policy = RetryPolicy::default();
    /// assert_eq!(policy.delay_after(1), Some(Duration::from_secs(10)));
    /// assert_eq!(policy.delay_after(2), Some(Duration::from_secs(20)));
    /// assert_eq!(policy.delay_after(3), None);
    /// ```
    pub fn delay_after(&self, attempt: u32) -> Option<Duration> {
        if attempt == 0 || attempt >= self.max_attempts {
            return None;
        }
        let exponent = i32::try_from(attempt - 1).unwrap_or(i32::MAX);
        let factor = self.multiplier.powi(exponent);
        let delay = Duration::try_from_secs_f64(self.base_delay.as_secs_f64() * factor)
            .unwrap_or(MAX_DELAY);
        Some(delay.min(MAX_DELAY))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_attempt_never_sleeps() {
        let policy = RetryPolicy::new(1, Duration::from_secs(10), 2.0);
        assert_eq!(policy.delay_after(1), None);
    }

    #[test]
    fn zero_attempts_is_raised_to_one() {
        assert_eq!(RetryPolicy::new(0, Duration::ZERO, 1.0).max_attempts, 1);
    }

    #[test]
    fn long_policies_are_capped_instead_of_overflowing() {
        let policy = RetryPolicy::new(100, Duration::from_secs(10), 2.0);
        assert_eq!(policy.delay_after(7), Some(Duration::from_secs(640)));
        assert_eq!(policy.delay_after(8), Some(MAX_DELAY));
        assert_eq!(policy.delay_after(99), Some(MAX_DELAY));
        assert_eq!(policy.delay_after(100), None);
    }

    #[test]
    fn nonsense_multipliers_do_not_panic() {
        let policy = RetryPolicy::new(4, Duration::from_secs(1), f64::NAN);
        assert_eq!(policy.delay_after(2), Some(MAX_DELAY));
        let policy = RetryPolicy::new(4, Duration::from_secs(1), -2.0);
        assert_eq!(policy.delay_after(2), Some(MAX_DELAY));
    }

    #[test]
    fn delays_grow_by_the_multiplier() {
        let policy = RetryPolicy::new(5, Duration::from_millis(500), 3.0);
        let delays: Vec<_> = (1..5).filter_map(|n| policy.delay_after(n)).collect();
        assert_eq!(
            delays,
            vec![
                Duration::from_millis(500),
                Duration::from_millis(1500),
                Duration::from_millis(4500),
                Duration::from_millis(13500),
            ]
        );
    }
}
