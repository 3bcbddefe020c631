//! Client-side request throttling.
//!
//! Fitbit allows 150 requests per rolling hour per user. Spacing calls at
//! least `interval / limit` apart keeps a whole conversion run under the
//! budget without having to track the window server-side.

use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

pub const API_RATE_LIMIT: u32 = 150;
pub const API_RATE_INTERVAL: Duration = Duration::from_secs(60 * 60);

#[derive(Debug)]
pub struct Throttle {
    min_interval: Duration,
    last: Mutex<Option<Instant>>,
}

impl Default for Throttle {
    fn default() -> Self {
        Self::new(API_RATE_INTERVAL / API_RATE_LIMIT)
    }
}

impl Throttle {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last: Mutex::new(None),
        }
    }

    /// Wait until the minimum interval since the previous call has passed.
    pub async fn acquire(&self) {
        let mut last = self.last.lock().await;
        if let Some(prev) = *last {
            let ready_at = prev + self.min_interval;
            let now = Instant::now();
            if ready_at > now {
                tokio::time::sleep(ready_at - now).await;
            }
        }
        *last = Some(Instant::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn spaces_consecutive_calls() {
        let throttle = Throttle::new(Duration::from_secs(24));
        let start = Instant::now();
        throttle.acquire().await;
        throttle.acquire().await;
        throttle.acquire().await;
        assert!(start.elapsed() >= Duration::from_secs(48));
    }

    #[tokio::test]
    async fn first_call_is_immediate() {
        let throttle = Throttle::new(Duration::from_secs(24));
        let start = std::time::Instant::now();
        throttle.acquire().await;
        assert!(start.elapsed() < Duration::from_secs(1));
    }
}
