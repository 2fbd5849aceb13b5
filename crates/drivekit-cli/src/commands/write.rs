use drivekit_core::Driver;
use serde_json::{json, Value};

use crate::cli::{DeleteArgs, UpdateArgs, WriteArgs};
use crate::commands::parse_record;
use crate::error::CliError;

pub async fn create(driver: &dyn Driver, args: &WriteArgs) -> Result<Value, CliError> {
    let data = parse_record(&args.data)?;
    let record = driver.create(&args.object, &data).await?;

    Ok(json!({
        "vendor": driver.vendor(),
        "object": args.object,
        "record": record,
    }))
}

pub async fn update(driver: &dyn Driver, args: &UpdateArgs) -> Result<Value, CliError> {
    let data = parse_record(&args.data)?;
    let record = driver.update(&args.object, &args.id, &data).await?;

    Ok(json!({
        "vendor": driver.vendor(),
        "object": args.object,
        "id": args.id,
        "record": record,
    }))
}

pub async fn delete(driver: &dyn Driver, args: &DeleteArgs) -> Result<Value, CliError> {
    let deleted = driver.delete(&args.object, &args.id).await?;

    Ok(json!({
        "vendor": driver.vendor(),
        "object": args.object,
        "id": args.id,
        "deleted": deleted,
    }))
}
