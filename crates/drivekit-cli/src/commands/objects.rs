use drivekit_core::Driver;
use serde_json::{json, Value};

use crate::error::CliError;

pub async fn run(driver: &dyn Driver) -> Result<Value, CliError> {
    let objects = driver.list_objects().await?;

    Ok(json!({
        "vendor": driver.vendor(),
        "count": objects.len(),
        "objects": objects,
    }))
}
