//! Time provider abstraction.
//!
//! Retry loops and pollers sleep through a [`TimeProvider`] instead of calling
//! tokio directly, so tests can count sleeps without waiting for them.

use std::time::Duration;

use async_trait::async_trait;

/// Provider trait for time operations.
#[async_trait]
pub trait TimeProvider: Clone + Send + Sync + 'static {
    /// Sleep for the specified duration.
    async fn sleep(&self, duration: Duration);

    /// Time elapsed since the provider was created.
    fn now(&self) -> Duration;
}

/// Real time provider using Tokio's time facilities.
#[derive(Debug, Clone)]
pub struct TokioTimeProvider {
    start_time: std::time::Instant,
}

impl TokioTimeProvider {
    /// Create a new Tokio time provider.
    pub fn new() -> Self {
        Self {
            start_time: std::time::Instant::now(),
        }
    }
}

impl Default for TokioTimeProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TimeProvider for TokioTimeProvider {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }

    fn now(&self) -> Duration {
        self.start_time.elapsed()
    }
}
