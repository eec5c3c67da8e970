//! Pause policy between consecutive messages.

use async_trait::async_trait;
use std::time::Duration;

/// Decides how long to wait after a message before sending the next one.
#[async_trait]
pub trait Throttle: Send + Sync {
    async fn pause(&self);
}

/// Sleep a fixed interval. Not cancellable once entered.
#[derive(Debug, Clone, Copy)]
pub struct FixedDelay(pub Duration);

#[async_trait]
impl Throttle for FixedDelay {
    async fn pause(&self) {
        if !self.0.is_zero() {
            tokio::time::sleep(self.0).await;
        }
    }
}

/// Never wait.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoThrottle;

#[async_trait]
impl Throttle for NoThrottle {
    async fn pause(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_fixed_delay_sleeps() {
        let start = tokio::time::Instant::now();
        FixedDelay(Duration::from_millis(1000)).pause().await;
        assert!(start.elapsed() >= Duration::from_millis(1000));
    }
}
