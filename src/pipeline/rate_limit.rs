use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{Instant, sleep_until};

/// Spaces out request starts by at least `interval`, across every task that
/// shares the limiter. The first request goes out immediately.
#[derive(Debug)]
pub struct RateLimiter {
    interval: Duration,
    next_slot: Mutex<Option<Instant>>,
}

// Longer intervals are clamped so slot arithmetic stays far from overflow.
const MAX_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);

impl RateLimiter {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval: interval.min(MAX_INTERVAL),
            next_slot: Mutex::new(None),
        }
    }

    /// Wait for this caller's slot. Slots are handed out in call order.
    pub async fn acquire(&self) {
        if self.interval.is_zero() {
            return;
        }

        let slot = {
            let mut next = self.next_slot.lock().await;
            let now = Instant::now();
            let slot = match *next {
                Some(at) if at > now => at,
                _ => now,
            };
            *next = Some(slot.checked_add(self.interval).unwrap_or(slot));
            slot
        };

        sleep_until(slot).await;
    }
}
