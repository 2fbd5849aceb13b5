use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use governor::clock::DefaultClock;
use governor::state::direct::NotKeyed;
use governor::state::InMemoryState;
use governor::{Quota, RateLimiter};
use serde::Serialize;

use crate::policy::VendorPolicy;

type DirectRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Rate limit snapshot exposed by `Driver::rate_limit_status`. Vendors that
/// do not report budget headers leave the remote fields empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct RateLimitStatus {
    pub remaining: Option<u32>,
    pub limit: Option<u32>,
    pub reset_after_secs: Option<u64>,
    pub retry_after_secs: Option<u64>,
}

impl RateLimitStatus {
    pub fn local(limit: u32, window: Duration) -> Self {
        Self {
            remaining: None,
            limit: Some(limit),
            reset_after_secs: Some(window.as_secs()),
            retry_after_secs: None,
        }
    }
}

/// Local quota gate consulted before each dispatch. When the budget is
/// exhausted the caller receives the recommended pause instead of hitting
/// the remote 429 path.
#[derive(Clone)]
pub struct RateGate {
    limiter: Arc<DirectRateLimiter>,
    quota_window: Duration,
    quota_limit: u32,
}

impl RateGate {
    pub fn new(quota_window: Duration, quota_limit: u32) -> Self {
        let quota = quota_from_window(quota_window, quota_limit);
        Self {
            limiter: Arc::new(RateLimiter::direct(quota)),
            quota_window,
            quota_limit,
        }
    }

    pub fn from_policy(policy: &VendorPolicy) -> Self {
        Self::new(policy.quota_window, policy.quota_limit)
    }

    /// Tries to take one unit of budget. When none is available the mean
    /// replenishment interval is returned as the suggested pause.
    pub fn acquire(&self) -> Result<(), Duration> {
        if self.limiter.check().is_ok() {
            return Ok(());
        }

        Err(self.replenish_interval())
    }

    pub fn status(&self) -> RateLimitStatus {
        RateLimitStatus::local(self.quota_limit, self.quota_window)
    }

    fn replenish_interval(&self) -> Duration {
        let seconds = self.quota_window.as_secs_f64() / f64::from(self.quota_limit.max(1));
        Duration::from_secs_f64(seconds.max(0.001))
    }
}

fn quota_from_window(quota_window: Duration, quota_limit: u32) -> Quota {
    let safe_limit = quota_limit.max(1);
    let burst = NonZeroU32::new(safe_limit).expect("safe limit must be non-zero");

    let seconds_per_cell = (quota_window.as_secs_f64() / f64::from(safe_limit)).max(0.001);
    let period = Duration::from_secs_f64(seconds_per_cell);

    Quota::with_period(period)
        .expect("period is always greater than zero")
        .allow_burst(burst)
}
