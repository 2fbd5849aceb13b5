use std::fmt::{Display, Formatter};

use serde::Serialize;
use serde_json::{Map, Value};

/// Uniform error taxonomy shared by every driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Authentication,
    Connection,
    ObjectNotFound,
    FieldNotFound,
    QuerySyntax,
    RateLimited,
    Validation,
    Timeout,
    NotSupported,
}

/// Structured driver error: a message plus a free-form details map for
/// programmatic handling.
#[derive(Debug, Clone, PartialEq)]
pub struct DriverError {
    kind: ErrorKind,
    message: String,
    details: Map<String, Value>,
    retryable: bool,
}

impl DriverError {
    fn new(kind: ErrorKind, message: impl Into<String>, retryable: bool) -> Self {
        Self {
            kind,
            message: message.into(),
            details: Map::new(),
            retryable,
        }
    }

    pub fn authentication(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Authentication, message, false)
    }

    pub fn connection(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Connection, message, true)
    }

    pub fn object_not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ObjectNotFound, message, false)
    }

    pub fn field_not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::FieldNotFound, message, false)
    }

    pub fn query_syntax(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::QuerySyntax, message, false)
    }

    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::RateLimited, message, true)
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, message, false)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Timeout, message, true)
    }

    pub fn not_supported(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotSupported, message, false)
    }

    /// Attaches a structured detail entry. Keys are overwritten on repeat.
    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.details.insert(key.into(), value.into());
        self
    }

    pub const fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub const fn details(&self) -> &Map<String, Value> {
        &self.details
    }

    pub fn detail(&self, key: &str) -> Option<&Value> {
        self.details.get(key)
    }

    pub const fn retryable(&self) -> bool {
        self.retryable
    }

    pub const fn code(&self) -> &'static str {
        match self.kind {
            ErrorKind::Authentication => "driver.authentication",
            ErrorKind::Connection => "driver.connection",
            ErrorKind::ObjectNotFound => "driver.object_not_found",
            ErrorKind::FieldNotFound => "driver.field_not_found",
            ErrorKind::QuerySyntax => "driver.query_syntax",
            ErrorKind::RateLimited => "driver.rate_limited",
            ErrorKind::Validation => "driver.validation",
            ErrorKind::Timeout => "driver.timeout",
            ErrorKind::NotSupported => "driver.not_supported",
        }
    }
}

impl Display for DriverError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.message, self.code())
    }
}

impl std::error::Error for DriverError {}
