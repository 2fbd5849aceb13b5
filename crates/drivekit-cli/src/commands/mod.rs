mod capabilities;
mod fields;
mod objects;
mod rate_limit;
mod read;
mod write;

use drivekit_core::{build_driver, VendorId};
use serde_json::Value;

use crate::cli::{Cli, Command};
use crate::error::CliError;

pub async fn run(cli: &Cli) -> Result<Value, CliError> {
    let vendor = VendorId::from(cli.vendor);
    log::debug!("dispatching {:?} against {vendor}", cli.command);
    let driver = build_driver(vendor)?;

    let value = match &cli.command {
        Command::Capabilities => capabilities::run(driver.as_ref())?,
        Command::Objects => objects::run(driver.as_ref()).await?,
        Command::Fields(args) => fields::run(driver.as_ref(), args).await?,
        Command::Read(args) => read::run(driver.as_ref(), args).await?,
        Command::Create(args) => write::create(driver.as_ref(), args).await?,
        Command::Update(args) => write::update(driver.as_ref(), args).await?,
        Command::Delete(args) => write::delete(driver.as_ref(), args).await?,
        Command::RateLimit => rate_limit::run(driver.as_ref())?,
    };

    driver.close();
    Ok(value)
}

/// Parses a `--data` argument into a record body.
pub(crate) fn parse_record(raw: &str) -> Result<drivekit_core::Record, CliError> {
    let value: Value = serde_json::from_str(raw)
        .map_err(|error| CliError::InvalidArguments(format!("--data is not valid JSON: {error}")))?;

    match value {
        Value::Object(record) => Ok(record),
        _ => Err(CliError::InvalidArguments(String::from(
            "--data must be a JSON object",
        ))),
    }
}
