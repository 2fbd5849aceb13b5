use drivekit_core::{BatchReader, Driver, ReadRequest};
use serde_json::{json, Value};

use crate::cli::ReadArgs;
use crate::error::CliError;

pub async fn run(driver: &dyn Driver, args: &ReadArgs) -> Result<Value, CliError> {
    let records = if args.all {
        let reader = BatchReader::new(driver, args.query.clone(), args.batch_size)?;
        reader.collect_all().await?
    } else {
        let mut request = ReadRequest::new(args.query.clone());
        if let Some(limit) = args.limit {
            request = request.with_limit(limit);
        }
        if let Some(offset) = args.offset {
            request = request.with_offset(offset);
        }
        driver.read(&request).await?
    };

    Ok(json!({
        "vendor": driver.vendor(),
        "count": records.len(),
        "records": records,
    }))
}
