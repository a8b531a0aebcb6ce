//! Exponential backoff with jitter.

use std::time::Duration;

use rand::Rng;

/// Delay before retry number `attempt` (1-based): `base * 2^(attempt-1)`,
/// capped at `max`, plus up to 10% jitter. Attempt 0 waits nothing.
pub fn exponential_delay(attempt: u32, base: Duration, max: Duration) -> Duration {
    if attempt == 0 {
        return Duration::ZERO;
    }

    let base_ms = base.as_millis() as u64;
    let max_ms = max.as_millis() as u64;
    let factor = 2u64.saturating_pow(attempt - 1);
    let capped = base_ms.saturating_mul(factor).min(max_ms);

    let jitter_range = capped / 10;
    let jitter = if jitter_range > 0 {
        rand::thread_rng().gen_range(0..jitter_range)
    } else {
        0
    };

    Duration::from_millis(capped + jitter)
}

/// Stateful backoff for a loop that keeps retrying the same operation,
/// such as rejoining a consumer group.
#[derive(Debug, Clone)]
pub struct Backoff {
    base: Duration,
    max: Duration,
    attempt: u32,
}

impl Backoff {
    pub fn new(base: Duration, max: Duration) -> Self {
        Self {
            base,
            max,
            attempt: 0,
        }
    }

    /// Record a failure and return how long to wait before the next try.
    pub fn next_delay(&mut self) -> Duration {
        self.attempt = self.attempt.saturating_add(1);
        exponential_delay(self.attempt, self.base, self.max)
    }

    /// Failures recorded since the last reset.
    pub fn attempts(&self) -> u32 {
        self.attempt
    }

    /// Forget past failures after a success.
    pub fn reset(&mut self) {
        self.attempt = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MS: fn(u64) -> Duration = Duration::from_millis;

    #[test]
    fn test_exponential_delay() {
        assert_eq!(exponential_delay(0, MS(100), MS(2000)), Duration::ZERO);

        let d1 = exponential_delay(1, MS(100), MS(2000));
        assert!(d1 >= MS(100) && d1 < MS(110));

        let d3 = exponential_delay(3, MS(100), MS(2000));
        assert!(d3 >= MS(400) && d3 < MS(440));

        let capped = exponential_delay(30, MS(100), MS(1000));
        assert!(capped >= MS(1000) && capped < MS(1100));
    }

    #[test]
    fn test_backoff_grows_and_resets() {
        let mut backoff = Backoff::new(MS(200), MS(10_000));
        let first = backoff.next_delay();
        let second = backoff.next_delay();
        assert!(second > first);
        assert_eq!(backoff.attempts(), 2);

        backoff.reset();
        assert_eq!(backoff.attempts(), 0);
        assert!(backoff.next_delay() < MS(220));
    }
}
