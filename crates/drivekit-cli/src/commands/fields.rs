use drivekit_core::Driver;
use serde_json::{json, Value};

use crate::cli::FieldsArgs;
use crate::error::CliError;

pub async fn run(driver: &dyn Driver, args: &FieldsArgs) -> Result<Value, CliError> {
    let schema = driver.get_fields(&args.object).await?;

    Ok(json!({
        "vendor": driver.vendor(),
        "object": args.object,
        "fields": schema,
    }))
}
