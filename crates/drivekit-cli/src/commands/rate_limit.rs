use drivekit_core::Driver;
use serde_json::{json, Value};

use crate::error::CliError;

pub fn run(driver: &dyn Driver) -> Result<Value, CliError> {
    Ok(json!({
        "vendor": driver.vendor(),
        "rate_limit": driver.rate_limit_status(),
    }))
}
