use rand::Rng;
use std::time::Duration;

/// How often a failed call is attempted and how long to wait between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first one.
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(1000),
        }
    }
}

impl RetryPolicy {
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            base_delay: Duration::ZERO,
        }
    }

    /// Delay to wait after `attempt` (1-based) failed.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        calculate_backoff_delay(attempt.saturating_sub(1), self.base_delay)
    }
}

/// Exponential backoff delay with jitter
fn calculate_backoff_delay(attempt: u32, base_delay: Duration) -> Duration {
    // Cap the exponent so a long retry chain cannot overflow
    let capped_attempt = attempt.min(10);

    let base_ms = base_delay.as_millis().min(u64::MAX as u128) as u64;
    let delay_ms = base_ms.saturating_mul(2_u64.saturating_pow(capped_attempt));

    if delay_ms == 0 {
        return Duration::ZERO;
    }

    // ±30% jitter
    let jitter_factor = rand::thread_rng().gen_range(0.7..1.3);
    Duration::from_millis((delay_ms as f64 * jitter_factor).round() as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_progression() {
        let base = Duration::from_millis(1000);

        let delay0 = calculate_backoff_delay(0, base);
        let delay1 = calculate_backoff_delay(1, base);
        let delay2 = calculate_backoff_delay(2, base);

        assert!(delay0.as_millis() >= 700 && delay0.as_millis() <= 1300);
        assert!(delay1.as_millis() >= 1400 && delay1.as_millis() <= 2600);
        assert!(delay2.as_millis() >= 2800 && delay2.as_millis() <= 5200);
    }

    #[test]
    fn test_backoff_cap() {
        let base = Duration::from_millis(1000);

        let delay_high = calculate_backoff_delay(20, base);
        // 1s * 2^10 with ±30% jitter
        assert!(delay_high.as_millis() >= 716_800 && delay_high.as_millis() <= 1_331_200);
    }

    #[test]
    fn test_zero_base_never_waits() {
        assert_eq!(calculate_backoff_delay(3, Duration::ZERO), Duration::ZERO);
        assert_eq!(RetryPolicy::none().delay_after(1), Duration::ZERO);
    }

    #[test]
    fn test_delay_after_first_attempt_uses_base() {
        let policy = RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(100),
        };
        let delay = policy.delay_after(1);
        assert!(delay.as_millis() >= 70 && delay.as_millis() <= 130);
    }
}
