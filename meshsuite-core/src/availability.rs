//! Bounded polling for service readiness.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use crate::error::{MeshError, MeshResult};
use crate::ids::ServiceId;
use crate::time::{TimeProvider, TokioTimeProvider};

/// Something that can report whether it is ready to serve.
#[async_trait]
pub trait Service: Send + Sync {
    /// Whether the service is up. Errors should be reported as `false`.
    async fn is_available(&self) -> bool;
}

/// Polls a [`Service`] until it reports available or the budget runs out.
pub struct AvailabilityChecker<T: TimeProvider = TokioTimeProvider> {
    service_id: ServiceId,
    service: Arc<dyn Service>,
    time: T,
}

impl AvailabilityChecker<TokioTimeProvider> {
    /// Checker using real time.
    pub fn new(service_id: ServiceId, service: Arc<dyn Service>) -> Self {
        Self::with_time(service_id, service, TokioTimeProvider::new())
    }
}

impl<T: TimeProvider> AvailabilityChecker<T> {
    /// Checker sleeping through `time`.
    pub fn with_time(service_id: ServiceId, service: Arc<dyn Service>, time: T) -> Self {
        Self {
            service_id,
            service,
            time,
        }
    }

    /// Evaluate the predicate up to `max_retries` times, sleeping
    /// `poll_interval` between evaluations but not after the last one.
    pub async fn wait_for_startup(
        &self,
        poll_interval: Duration,
        max_retries: u32,
    ) -> MeshResult<()> {
        for attempt in 1..=max_retries {
            if self.service.is_available().await {
                debug!(service_id = %self.service_id, attempt, "service is available");
                return Ok(());
            }
            debug!(
                service_id = %self.service_id,
                attempt,
                max_retries,
                "service not yet available"
            );
            if attempt < max_retries {
                self.time.sleep(poll_interval).await;
            }
        }
        Err(MeshError::ServiceUnavailable {
            service_id: self.service_id.clone(),
            attempts: max_retries,
            interval: poll_interval,
        })
    }
}
