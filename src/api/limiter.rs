use std::time::Duration;
use tokio::time::Instant;

/// Single-slot rate limiter enforcing minimum spacing between request starts
///
/// The limiter is owned by one [`crate::api::ApiClient`] and acquired through
/// `&mut self`, so at most one request is ever in flight. That single-slot
/// discipline is the only synchronization the crate needs.
#[derive(Debug)]
pub struct RateLimiter {
    min_interval: Duration,
    last_start: Option<Instant>,
}

impl RateLimiter {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_start: None,
        }
    }

    /// Waits until the minimum spacing since the previous request start has
    /// elapsed, then records the new start
    pub async fn acquire(&mut self) {
        if let Some(last) = self.last_start {
            let elapsed = last.elapsed();
            if elapsed < self.min_interval {
                tokio::time::sleep(self.min_interval - elapsed).await;
            }
        }
        self.last_start = Some(Instant::now());
    }
}
