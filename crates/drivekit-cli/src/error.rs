use drivekit_core::{DriverError, ErrorKind};
use thiserror::Error;

/// CLI-level error categories mapped to exit codes.
#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Driver(#[from] DriverError),

    #[error("invalid arguments: {0}")]
    InvalidArguments(String),

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CliError {
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Driver(error) => match error.kind() {
                ErrorKind::Validation | ErrorKind::QuerySyntax => 2,
                ErrorKind::Authentication => 3,
                ErrorKind::ObjectNotFound | ErrorKind::FieldNotFound => 4,
                ErrorKind::RateLimited => 5,
                ErrorKind::Connection | ErrorKind::Timeout => 6,
                ErrorKind::NotSupported => 7,
            },
            Self::InvalidArguments(_) => 2,
            Self::Serialization(_) | Self::Io(_) => 10,
        }
    }
}
