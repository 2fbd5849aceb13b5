//! Vendor driver implementations.

pub mod amplitude;
pub mod apify;
pub mod fidoo;
pub mod mpohoda;
pub mod odoo;
pub mod posthog;
pub mod stripe;

pub use amplitude::AmplitudeDriver;
pub use apify::ApifyDriver;
pub use fidoo::FidooDriver;
pub use mpohoda::MpohodaDriver;
pub use odoo::OdooDriver;
pub use posthog::PosthogDriver;
pub use stripe::StripeDriver;

use crate::envelope::Record;
use crate::error::DriverError;

/// Validates a caller-supplied page limit against a driver's page cap.
pub(crate) fn validate_limit(limit: usize, max: usize) -> Result<usize, DriverError> {
    if limit < 1 || limit > max {
        return Err(DriverError::validation(format!(
            "limit must be between 1 and {max} (got: {limit})"
        ))
        .with_detail("provided", limit)
        .with_detail("maximum", max)
        .with_detail("parameter", "limit"));
    }
    Ok(limit)
}

/// Takes the first record of a write response, erroring on an empty body.
pub(crate) fn first_record(
    mut records: Vec<Record>,
    context: &str,
) -> Result<Record, DriverError> {
    if records.is_empty() {
        return Err(
            DriverError::connection(format!("empty response from API during {context}"))
                .with_detail("operation", context),
        );
    }
    Ok(records.remove(0))
}
