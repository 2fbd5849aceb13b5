//! Driver construction from vendor ids.

use std::sync::Arc;

use crate::driver::Driver;
use crate::drivers::{
    AmplitudeDriver, ApifyDriver, FidooDriver, MpohodaDriver, OdooDriver, PosthogDriver,
    StripeDriver,
};
use crate::error::DriverError;
use crate::vendor::VendorId;

/// Builds a driver for `vendor`, reading its credentials from the
/// environment. Fails with an authentication error when they are missing.
pub fn build_driver(vendor: VendorId) -> Result<Arc<dyn Driver>, DriverError> {
    let driver: Arc<dyn Driver> = match vendor {
        VendorId::Amplitude => Arc::new(AmplitudeDriver::from_env()?),
        VendorId::Apify => Arc::new(ApifyDriver::from_env()?),
        VendorId::Fidoo => Arc::new(FidooDriver::from_env()?),
        VendorId::Mpohoda => Arc::new(MpohodaDriver::from_env()?),
        VendorId::Odoo => Arc::new(OdooDriver::from_env()?),
        VendorId::Posthog => Arc::new(PosthogDriver::from_env()?),
        VendorId::Stripe => Arc::new(StripeDriver::from_env()?),
    };

    log::debug!("built {} driver", driver.vendor());
    Ok(driver)
}
