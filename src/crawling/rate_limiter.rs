//! Per-platform request spacing shared by every search

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use tokio_util::sync::CancellationToken;
use tracing::trace;

use crate::domain::Platform;
use crate::infrastructure::config::RateLimitConfig;

/// One GCRA limiter per platform. Cloning shares the underlying limiters.
#[derive(Clone, Default)]
pub struct PlatformRateLimiters {
    limiters: HashMap<Platform, Arc<DefaultDirectRateLimiter>>,
    intervals: HashMap<Platform, Duration>,
}

impl PlatformRateLimiters {
    pub fn new(config: &RateLimitConfig) -> Self {
        let mut limiters = Self::default();
        for platform in Platform::ALL {
            limiters.set_interval(platform, config.interval_for(platform));
        }
        limiters
    }

    /// No spacing for any platform
    pub fn unlimited() -> Self {
        Self::default()
    }

    /// A zero interval removes the limiter for `platform`
    pub fn set_interval(&mut self, platform: Platform, interval: Duration) {
        match Quota::with_period(interval) {
            Some(quota) => {
                self.limiters.insert(platform, Arc::new(RateLimiter::direct(quota)));
                self.intervals.insert(platform, interval);
            }
            None => {
                self.limiters.remove(&platform);
                self.intervals.remove(&platform);
            }
        }
    }

    pub fn interval(&self, platform: Platform) -> Duration {
        self.intervals.get(&platform).copied().unwrap_or(Duration::ZERO)
    }

    /// Wait for the next request slot of `platform`.
    ///
    /// Returns `false` if `cancel` fired first; no slot is consumed then.
    pub async fn acquire(&self, platform: Platform, cancel: &CancellationToken) -> bool {
        let Some(limiter) = self.limiters.get(&platform) else {
            return !cancel.is_cancelled();
        };
        if limiter.check().is_ok() {
            return !cancel.is_cancelled();
        }

        trace!("[{}] waiting for rate limit slot", platform);
        tokio::select! {
            () = cancel.cancelled() => false,
            () = limiter.until_ready() => true,
        }
    }
}

impl std::fmt::Debug for PlatformRateLimiters {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlatformRateLimiters")
            .field("intervals", &self.intervals)
            .finish_non_exhaustive()
    }
}
