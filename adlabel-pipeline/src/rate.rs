use std::time::Duration;
use tokio::time::{sleep, Instant};

/// Token bucket spacing out remote calls.
///
/// Refills at `qps` tokens per second up to `burst`. A caller that finds the
/// bucket short takes its token anyway, leaving the balance negative, and
/// sleeps off the debt, so the next caller queues behind it.
#[derive(Debug)]
pub struct RateLimiter {
    bucket: Option<Bucket>,
}

#[derive(Debug)]
struct Bucket {
    qps: f64,
    burst: f64,
    tokens: f64,
    last: Instant,
}

impl Bucket {
    fn needed_wait(&mut self, need: f64, now: Instant) -> Duration {
        let dt = now.duration_since(self.last).as_secs_f64();
        self.last = now;
        self.tokens = (self.tokens + dt * self.qps).min(self.burst);
        self.tokens -= need;
        if self.tokens >= 0.0 {
            Duration::ZERO
        } else {
            Duration::from_secs_f64(-self.tokens / self.qps)
        }
    }
}

impl RateLimiter {
    /// At most one call per `interval`, no bursts. A zero interval disables
    /// limiting.
    pub fn per_interval(interval: Duration) -> Self {
        if interval.is_zero() {
            return Self::unlimited();
        }
        Self::new(1.0 / interval.as_secs_f64(), 1)
    }

    /// Non-positive or non-finite `qps` disables limiting.
    pub fn new(qps: f64, burst: u32) -> Self {
        if !(qps.is_finite() && qps > 0.0) {
            return Self::unlimited();
        }
        let burst = f64::from(burst.max(1));
        Self {
            bucket: Some(Bucket {
                qps,
                burst,
                tokens: burst,
                last: Instant::now(),
            }),
        }
    }

    pub fn unlimited() -> Self {
        Self { bucket: None }
    }

    /// Wait until one call is allowed.
    pub async fn acquire(&mut self) {
        let Some(bucket) = self.bucket.as_mut() else {
            return;
        };
        let wait = bucket.needed_wait(1.0, Instant::now());
        if !wait.is_zero() {
            sleep(wait).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn calls_are_spaced_by_the_interval() {
        let mut limiter = RateLimiter::per_interval(Duration::from_millis(100));
        let start = Instant::now();
        for _ in 0..5 {
            limiter.acquire().await;
        }
        // first call is free, the next four wait 100ms each
        assert!(start.elapsed() >= Duration::from_millis(400));
        assert!(start.elapsed() < Duration::from_millis(450));
    }

    #[tokio::test(start_paused = true)]
    async fn idle_time_refills_but_never_beyond_burst() {
        let mut limiter = RateLimiter::new(10.0, 2);
        limiter.acquire().await;
        limiter.acquire().await;
        tokio::time::advance(Duration::from_secs(5)).await;

        let start = Instant::now();
        limiter.acquire().await;
        limiter.acquire().await;
        assert!(start.elapsed() < Duration::from_millis(1));
        limiter.acquire().await;
        assert!(start.elapsed() >= Duration::from_millis(100));
    }

    #[tokio::test(start_paused = true)]
    async fn zero_interval_never_waits() {
        let mut limiter = RateLimiter::per_interval(Duration::ZERO);
        let start = Instant::now();
        for _ in 0..100 {
            limiter.acquire().await;
        }
        assert_eq!(start.elapsed(), Duration::ZERO);
    }
}
