//! Admission control for backend calls made by the trainer.
//!
//! Callers wait here before their per-call deadline starts, so a call
//! queued behind `max_concurrency` others never times out unsent.

use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use std::num::NonZeroU32;
use tokio::sync::{Semaphore, SemaphorePermit};

/// Bounds in-flight calls and, optionally, calls per minute.
pub struct CallLimiter {
    permits: Semaphore,
    quota: Option<DefaultDirectRateLimiter>,
}

impl CallLimiter {
    /// Limiter allowing `max_concurrency` calls at once, at least one.
    pub fn new(max_concurrency: usize) -> Self {
        Self {
            permits: Semaphore::new(max_concurrency.max(1)),
            quota: None,
        }
    }

    /// Add a requests-per-minute quota. `None` or zero leaves the rate unbounded.
    pub fn with_requests_per_minute(mut self, requests_per_minute: Option<u32>) -> Self {
        self.quota = requests_per_minute
            .and_then(NonZeroU32::new)
            .map(|rpm| RateLimiter::direct(Quota::per_minute(rpm)));
        self
    }

    /// Wait for a concurrency slot and, with a quota, for the rate to allow
    /// one more call. The slot is held until the permit is dropped.
    ///
    /// Waiters are admitted in arrival order.
    pub async fn admit(&self) -> Option<SemaphorePermit<'_>> {
        let permit = self.permits.acquire().await.ok()?;
        if let Some(quota) = &self.quota {
            quota.until_ready().await;
        }
        Some(permit)
    }

    /// Concurrency slots free right now.
    pub fn available_permits(&self) -> usize {
        self.permits.available_permits()
    }
}
