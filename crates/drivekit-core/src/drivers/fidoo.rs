//! Fidoo expense management driver.
//!
//! Read-only access over the partner REST API with keyset cursors.

use std::sync::Arc;

use crate::capability::{DriverCapabilities, PaginationStyle};
use crate::config::{env_or, required_env};
use crate::driver::{Driver, DriverFuture, ReadRequest};
use crate::drivers::validate_limit;
use crate::envelope::{self, Record};
use crate::error::DriverError;
use crate::http::{HttpAuth, HttpClient, HttpRequest, ReqwestHttpClient};
use crate::pagination::{Page, PageCursor, PageRequest};
use crate::schema::{field, unknown_object, FieldType, ObjectSchema};
use crate::throttle::RateLimitStatus;
use crate::transport::RestTransport;
use crate::vendor::VendorId;

const DEFAULT_BASE_URL: &str = "https://api.fidoo.com/v2";
const MAX_PAGE_SIZE: usize = 100;

const OBJECTS: [&str; 7] = [
    "users",
    "cards",
    "transactions",
    "expenses",
    "teams",
    "cost-centers",
    "projects",
];

pub struct FidooDriver {
    transport: RestTransport,
}

impl FidooDriver {
    /// Reads `FIDOO_API_KEY` (and optionally `FIDOO_API_URL`) from the
    /// environment.
    pub fn from_env() -> Result<Self, DriverError> {
        let api_key = required_env("FIDOO_API_KEY")?;
        let base_url = env_or("FIDOO_API_URL", DEFAULT_BASE_URL);
        Ok(Self::new(api_key, base_url, Arc::new(ReqwestHttpClient::new())))
    }

    pub fn new(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        http: Arc<dyn HttpClient>,
    ) -> Self {
        let transport = RestTransport::new(
            VendorId::Fidoo,
            base_url,
            HttpAuth::Header {
                name: String::from("X-Api-Key"),
                value: api_key.into(),
            },
            http,
        );
        Self { transport }
    }

    fn validate_object(object: &str) -> Result<&str, DriverError> {
        let object = object.trim().trim_matches('/');
        if OBJECTS.contains(&object) {
            Ok(object)
        } else {
            Err(unknown_object(object, &OBJECTS))
        }
    }

    fn schema_for(object: &str) -> Result<ObjectSchema, DriverError> {
        let object = Self::validate_object(object)?;
        let mut schema = ObjectSchema::new();
        schema.insert(
            String::from("id"),
            field(FieldType::String, true, "Resource identifier"),
        );
        schema.insert(
            String::from("state"),
            field(FieldType::String, false, "Lifecycle state"),
        );

        match object {
            "users" => {
                schema.insert(
                    String::from("firstName"),
                    field(FieldType::String, true, "Given name"),
                );
                schema.insert(
                    String::from("lastName"),
                    field(FieldType::String, true, "Family name"),
                );
                schema.insert(
                    String::from("email"),
                    field(FieldType::String, true, "Login email"),
                );
            }
            "cards" => {
                schema.insert(
                    String::from("cardNumber"),
                    field(FieldType::String, false, "Masked card number"),
                );
                schema.insert(
                    String::from("ownerUserId"),
                    field(FieldType::String, false, "Cardholder identifier"),
                );
            }
            "transactions" => {
                schema.insert(
                    String::from("amount"),
                    field(FieldType::Float, true, "Transaction amount"),
                );
                schema.insert(
                    String::from("currency"),
                    field(FieldType::String, true, "ISO currency code"),
                );
                schema.insert(
                    String::from("bookedAt"),
                    field(FieldType::DateTime, false, "Booking timestamp"),
                );
            }
            "expenses" => {
                schema.insert(
                    String::from("amount"),
                    field(FieldType::Float, true, "Expense amount"),
                );
                schema.insert(
                    String::from("description"),
                    field(FieldType::String, false, "Expense description"),
                );
                schema.insert(
                    String::from("costCenterId"),
                    field(FieldType::String, false, "Assigned cost center"),
                );
            }
            _ => {
                schema.insert(
                    String::from("name"),
                    field(FieldType::String, true, "Display name"),
                );
            }
        }
        Ok(schema)
    }

    async fn fetch(
        &self,
        object: &str,
        limit: usize,
        cursor: Option<&str>,
    ) -> Result<(Vec<Record>, Option<String>), DriverError> {
        let mut request = HttpRequest::get(self.transport.join(object))
            .with_query("limit", limit.to_string());
        if let Some(cursor) = cursor {
            request = request.with_query("cursor", cursor.to_owned());
        }

        let value = self.transport.send_json(request).await?;
        let records = envelope::extract_records(&value);
        let next = envelope::page_info(&value).next_cursor;
        Ok((records, next))
    }
}

impl Driver for FidooDriver {
    fn vendor(&self) -> VendorId {
        VendorId::Fidoo
    }

    fn capabilities(&self) -> DriverCapabilities {
        DriverCapabilities::read_only(PaginationStyle::Cursor, Some(MAX_PAGE_SIZE))
            .with_batch_operations()
    }

    fn list_objects(&self) -> DriverFuture<'_, Vec<String>> {
        Box::pin(async { Ok(OBJECTS.iter().map(|name| String::from(*name)).collect()) })
    }

    fn get_fields<'a>(&'a self, object: &'a str) -> DriverFuture<'a, ObjectSchema> {
        Box::pin(async move { Self::schema_for(object) })
    }

    fn read<'a>(&'a self, request: &'a ReadRequest) -> DriverFuture<'a, Vec<Record>> {
        Box::pin(async move {
            let object = Self::validate_object(&request.query)?;
            let limit = validate_limit(request.limit.unwrap_or(MAX_PAGE_SIZE), MAX_PAGE_SIZE)?;

            // Cursor-only API: an offset is served by walking pages and
            // discarding the skipped records.
            let mut skip = request.offset.unwrap_or(0);
            let mut cursor: Option<String> = None;
            let mut out = Vec::new();

            loop {
                let (records, next) = self.fetch(object, MAX_PAGE_SIZE.min(skip + limit), cursor.as_deref()).await?;
                let count = records.len();

                for record in records.into_iter() {
                    if skip > 0 {
                        skip -= 1;
                        continue;
                    }
                    if out.len() < limit {
                        out.push(record);
                    }
                }

                if out.len() >= limit || count == 0 {
                    return Ok(out);
                }
                match next {
                    Some(token) => cursor = Some(token),
                    None => return Ok(out),
                }
            }
        })
    }

    fn fetch_page<'a>(&'a self, request: &'a PageRequest) -> DriverFuture<'a, Page> {
        Box::pin(async move {
            let object = Self::validate_object(&request.query)?;
            let cursor = match &request.cursor {
                PageCursor::Start => None,
                PageCursor::Token(token) => Some(token.as_str()),
                other => {
                    return Err(DriverError::validation(format!(
                        "fidoo pagination is cursor based, got: {other:?}"
                    )));
                }
            };

            let (records, next) = self.fetch(object, request.batch_size, cursor).await?;
            Ok(Page {
                records,
                next: next.map(PageCursor::Token),
            })
        })
    }

    fn rate_limit_status(&self) -> RateLimitStatus {
        self.transport.rate_limit_status()
    }
}
