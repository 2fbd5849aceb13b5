use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::DriverError;

/// Canonical vendor identifiers for the supported drivers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VendorId {
    Amplitude,
    Apify,
    Fidoo,
    Mpohoda,
    Odoo,
    Posthog,
    Stripe,
}

impl VendorId {
    pub const ALL: [Self; 7] = [
        Self::Amplitude,
        Self::Apify,
        Self::Fidoo,
        Self::Mpohoda,
        Self::Odoo,
        Self::Posthog,
        Self::Stripe,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Amplitude => "amplitude",
            Self::Apify => "apify",
            Self::Fidoo => "fidoo",
            Self::Mpohoda => "mpohoda",
            Self::Odoo => "odoo",
            Self::Posthog => "posthog",
            Self::Stripe => "stripe",
        }
    }
}

impl Display for VendorId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VendorId {
    type Err = DriverError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "amplitude" => Ok(Self::Amplitude),
            "apify" => Ok(Self::Apify),
            "fidoo" => Ok(Self::Fidoo),
            "mpohoda" => Ok(Self::Mpohoda),
            "odoo" => Ok(Self::Odoo),
            "posthog" => Ok(Self::Posthog),
            "stripe" => Ok(Self::Stripe),
            other => Err(DriverError::validation(format!(
                "unknown vendor '{other}', expected one of amplitude, apify, fidoo, mpohoda, odoo, posthog, stripe"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_all_vendor_names() {
        for vendor in VendorId::ALL {
            let parsed: VendorId = vendor.as_str().parse().expect("round-trips");
            assert_eq!(parsed, vendor);
        }
    }

    #[test]
    fn rejects_unknown_vendor() {
        let err = "salesforce".parse::<VendorId>().expect_err("must fail");
        assert_eq!(err.kind(), crate::ErrorKind::Validation);
    }
}
