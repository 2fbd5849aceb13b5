use drivekit_core::Driver;
use serde_json::{json, Value};

use crate::error::CliError;

pub fn run(driver: &dyn Driver) -> Result<Value, CliError> {
    let caps = driver.capabilities();

    Ok(json!({
        "vendor": driver.vendor(),
        "capabilities": caps,
        "supported_operations": caps.supported_operations(),
    }))
}
