use std::time::Duration;

use crate::retry::{Backoff, RetryPolicy};
use crate::vendor::VendorId;

/// Per-vendor rate budget and retry defaults, mirroring each API's
/// documented free-tier limits.
#[derive(Debug, Clone, PartialEq)]
pub struct VendorPolicy {
    pub vendor: VendorId,
    pub quota_window: Duration,
    pub quota_limit: u32,
    pub retry: RetryPolicy,
}

impl VendorPolicy {
    fn with_quota(vendor: VendorId, quota_window: Duration, quota_limit: u32) -> Self {
        Self {
            vendor,
            quota_window,
            quota_limit,
            retry: RetryPolicy::default(),
        }
    }

    pub fn amplitude_default() -> Self {
        // HTTP V2 API: 1000 events/sec, export far lower; budget conservatively.
        Self::with_quota(VendorId::Amplitude, Duration::from_secs(60), 360)
    }

    pub fn apify_default() -> Self {
        Self::with_quota(VendorId::Apify, Duration::from_secs(60), 250)
    }

    pub fn fidoo_default() -> Self {
        Self::with_quota(VendorId::Fidoo, Duration::from_secs(60), 120)
    }

    pub fn mpohoda_default() -> Self {
        // Monthly caps per endpoint type; the local gate only smooths bursts.
        Self::with_quota(VendorId::Mpohoda, Duration::from_secs(60), 60)
    }

    pub fn odoo_default() -> Self {
        Self::with_quota(VendorId::Odoo, Duration::from_secs(60), 120)
    }

    pub fn posthog_default() -> Self {
        Self {
            retry: RetryPolicy {
                backoff: Backoff::Exponential {
                    base: Duration::from_secs(1),
                    factor: 2.0,
                    max: Duration::from_secs(120),
                    jitter: true,
                },
                ..RetryPolicy::default()
            },
            ..Self::with_quota(VendorId::Posthog, Duration::from_secs(60), 240)
        }
    }

    pub fn stripe_default() -> Self {
        // 100 read ops/sec in live mode; 25/sec in test mode.
        Self::with_quota(VendorId::Stripe, Duration::from_secs(1), 25)
    }

    pub fn default_for(vendor: VendorId) -> Self {
        match vendor {
            VendorId::Amplitude => Self::amplitude_default(),
            VendorId::Apify => Self::apify_default(),
            VendorId::Fidoo => Self::fidoo_default(),
            VendorId::Mpohoda => Self::mpohoda_default(),
            VendorId::Odoo => Self::odoo_default(),
            VendorId::Posthog => Self::posthog_default(),
            VendorId::Stripe => Self::stripe_default(),
        }
    }
}
