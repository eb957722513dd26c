//! Pacing between processed days, to stay polite with the public archive.

use crate::input::ThrottleConfig;
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug)]
pub enum Throttle {
    None,
    Fixed(Duration),
    TokenBucket(TokenBucket),
}

impl Throttle {
    pub fn from_config(config: &ThrottleConfig) -> Self {
        match config {
            ThrottleConfig::None => Throttle::None,
            ThrottleConfig::Fixed { delay_ms } => Throttle::Fixed(Duration::from_millis(*delay_ms)),
            ThrottleConfig::TokenBucket {
                capacity,
                refill_per_sec,
            } => Throttle::TokenBucket(TokenBucket::new(*capacity, *refill_per_sec)),
        }
    }

    /// Waits as long as the policy requires before the next unit of work.
    pub async fn pace(&mut self) {
        let wait = match self {
            Throttle::None => Duration::ZERO,
            Throttle::Fixed(delay) => *delay,
            Throttle::TokenBucket(bucket) => bucket.take(Instant::now()),
        };
        if !wait.is_zero() {
            tokio::time::sleep(wait).await;
        }
    }
}

/// Allows bursts of `capacity` days, then one day per `1 / refill_per_sec`
/// seconds.
#[derive(Debug)]
pub struct TokenBucket {
    capacity: f64,
    refill_per_sec: f64,
    tokens: f64,
    last: Option<Instant>,
}

impl TokenBucket {
    pub fn new(capacity: u32, refill_per_sec: f64) -> Self {
        Self {
            capacity: capacity as f64,
            refill_per_sec,
            tokens: capacity as f64,
            last: None,
        }
    }

    /// Consumes one token at `now` and returns how long to wait for it.
    fn take(&mut self, now: Instant) -> Duration {
        if let Some(last) = self.last {
            let elapsed = now.saturating_duration_since(last).as_secs_f64();
            self.tokens = (self.tokens + elapsed * self.refill_per_sec).min(self.capacity);
        }
        self.last = Some(now);

        self.tokens -= 1.0;
        if self.tokens >= 0.0 {
            Duration::ZERO
        } else {
            Duration::from_secs_f64(-self.tokens / self.refill_per_sec)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_config() {
        assert!(matches!(Throttle::from_config(&ThrottleConfig::None), Throttle::None));
        assert!(matches!(
            Throttle::from_config(&ThrottleConfig::default()),
            Throttle::Fixed(d) if d == Duration::from_secs(1)
        ));
    }

    #[test]
    fn test_token_bucket_burst_then_wait() {
        let mut bucket = TokenBucket::new(2, 0.5);
        let t0 = Instant::now();
        assert_eq!(bucket.take(t0), Duration::ZERO);
        assert_eq!(bucket.take(t0), Duration::ZERO);
        // Empty bucket: one token every two seconds
        assert_eq!(bucket.take(t0), Duration::from_secs(2));
    }

    #[test]
    fn test_token_bucket_refills() {
        let mut bucket = TokenBucket::new(1, 1.0);
        let t0 = Instant::now();
        assert_eq!(bucket.take(t0), Duration::ZERO);
        assert_eq!(bucket.take(t0 + Duration::from_secs(5)), Duration::ZERO);
    }

    #[tokio::test]
    async fn test_fixed_pace_sleeps() {
        let mut throttle = Throttle::Fixed(Duration::from_millis(20));
        let start = Instant::now();
        throttle.pace().await;
        assert!(start.elapsed() >= Duration::from_millis(20));
    }
}
