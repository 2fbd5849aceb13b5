//! Core contracts for drivekit.
//!
//! This crate contains:
//! - The vendor-agnostic `Driver` trait and capability descriptions
//! - The structured driver error taxonomy
//! - The shared REST transport with rate gating and retries
//! - Envelope-tolerant response parsing and batch pagination
//! - The seven vendor driver implementations

pub mod capability;
pub mod config;
pub mod driver;
pub mod drivers;
pub mod envelope;
pub mod error;
pub mod http;
pub mod pagination;
pub mod policy;
pub mod registry;
pub mod retry;
pub mod schema;
pub mod throttle;
pub mod transport;
pub mod vendor;

#[cfg(test)]
pub(crate) mod testing;

pub use capability::{DriverCapabilities, PaginationStyle};
pub use config::{env_or, optional_env, required_env};
pub use driver::{Driver, DriverFuture, ReadRequest};
pub use drivers::{
    AmplitudeDriver, ApifyDriver, FidooDriver, MpohodaDriver, OdooDriver, PosthogDriver,
    StripeDriver,
};
pub use envelope::{extract_records, page_info, parse_json, PageInfo, Record};
pub use error::{DriverError, ErrorKind};
pub use http::{
    HttpAuth, HttpBody, HttpClient, HttpError, HttpErrorKind, HttpMethod, HttpRequest,
    HttpResponse, NoopHttpClient, ReqwestHttpClient,
};
pub use pagination::{BatchReader, Page, PageCursor, PageRequest};
pub use policy::VendorPolicy;
pub use registry::build_driver;
pub use retry::{Backoff, RetryPolicy};
pub use schema::{FieldSpec, FieldType, ObjectSchema};
pub use throttle::{RateGate, RateLimitStatus};
pub use transport::RestTransport;
pub use vendor::VendorId;
