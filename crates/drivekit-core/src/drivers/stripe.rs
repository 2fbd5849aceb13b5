//! Stripe payments driver.
//!
//! Reads page with `starting_after` cursors; writes are form-encoded the
//! way the Stripe API expects.

use std::sync::Arc;

use serde_json::Value;

use crate::capability::{DriverCapabilities, PaginationStyle};
use crate::config::{env_or, required_env};
use crate::driver::{Driver, DriverFuture, ReadRequest};
use crate::drivers::{first_record, validate_limit};
use crate::envelope::{self, Record};
use crate::error::DriverError;
use crate::http::{HttpAuth, HttpBody, HttpClient, HttpMethod, HttpRequest, ReqwestHttpClient};
use crate::pagination::{Page, PageCursor, PageRequest};
use crate::schema::{field, unknown_object, FieldType, ObjectSchema};
use crate::throttle::RateLimitStatus;
use crate::transport::RestTransport;
use crate::vendor::VendorId;

const DEFAULT_BASE_URL: &str = "https://api.stripe.com";
const MAX_PAGE_SIZE: usize = 100;

const OBJECTS: [&str; 21] = [
    "account",
    "account_session",
    "balance",
    "balance_transaction",
    "charge",
    "checkout_session",
    "country_spec",
    "coupon",
    "credit_note",
    "customer",
    "dispute",
    "event",
    "invoice",
    "payment_intent",
    "payment_method",
    "payout",
    "price",
    "product",
    "refund",
    "subscription",
    "transfer",
];

pub struct StripeDriver {
    transport: RestTransport,
}

impl StripeDriver {
    /// Reads `STRIPE_API_KEY` (and optionally `STRIPE_BASE_URL`) from the
    /// environment.
    pub fn from_env() -> Result<Self, DriverError> {
        let api_key = required_env("STRIPE_API_KEY")?;
        let base_url = env_or("STRIPE_BASE_URL", DEFAULT_BASE_URL);
        Ok(Self::new(api_key, base_url, Arc::new(ReqwestHttpClient::new())))
    }

    pub fn new(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        http: Arc<dyn HttpClient>,
    ) -> Self {
        let transport = RestTransport::new(
            VendorId::Stripe,
            base_url,
            HttpAuth::BearerToken(api_key.into()),
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

    /// Maps an object name to its collection endpoint under `/v1`.
    fn endpoint_for(object: &str) -> String {
        match object {
            "balance" => String::from("v1/balance"),
            "checkout_session" => String::from("v1/checkout/sessions"),
            _ => format!("v1/{object}s"),
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
            String::from("object"),
            field(FieldType::String, true, "Object type tag"),
        );
        schema.insert(
            String::from("created"),
            field(FieldType::Integer, false, "Creation time as a Unix epoch"),
        );
        schema.insert(
            String::from("livemode"),
            field(FieldType::Boolean, false, "Live versus test mode"),
        );

        match object {
            "customer" => {
                schema.insert(
                    String::from("email"),
                    field(FieldType::String, false, "Customer email"),
                );
                schema.insert(
                    String::from("name"),
                    field(FieldType::String, false, "Customer name"),
                );
                schema.insert(
                    String::from("balance"),
                    field(FieldType::Integer, false, "Account balance in minor units"),
                );
            }
            "charge" | "payment_intent" => {
                schema.insert(
                    String::from("amount"),
                    field(FieldType::Integer, true, "Amount in minor currency units"),
                );
                schema.insert(
                    String::from("currency"),
                    field(FieldType::String, true, "ISO currency code"),
                );
                schema.insert(
                    String::from("status"),
                    field(FieldType::String, false, "Processing status"),
                );
                schema.insert(
                    String::from("customer"),
                    field(FieldType::String, false, "Associated customer id"),
                );
            }
            "invoice" => {
                schema.insert(
                    String::from("customer"),
                    field(FieldType::String, true, "Billed customer id"),
                );
                schema.insert(
                    String::from("amount_due"),
                    field(FieldType::Integer, false, "Amount due in minor units"),
                );
                schema.insert(
                    String::from("status"),
                    field(FieldType::String, false, "Invoice status"),
                );
            }
            "product" => {
                schema.insert(
                    String::from("name"),
                    field(FieldType::String, true, "Product name"),
                );
                schema.insert(
                    String::from("active"),
                    field(FieldType::Boolean, false, "Available for purchase"),
                );
                schema.insert(
                    String::from("description"),
                    field(FieldType::String, false, "Product description"),
                );
            }
            _ => {}
        }
        Ok(schema)
    }

    /// Flattens a record into Stripe's bracketed form encoding. Nested
    /// objects and arrays go one level deep, which covers metadata and
    /// line-item style parameters.
    fn form_fields(data: &Record) -> Vec<(String, String)> {
        let mut fields = Vec::new();
        for (key, value) in data {
            match value {
                Value::Object(nested) => {
                    for (sub, sub_value) in nested {
                        fields.push((format!("{key}[{sub}]"), scalar_text(sub_value)));
                    }
                }
                Value::Array(items) => {
                    for (index, item) in items.iter().enumerate() {
                        fields.push((format!("{key}[{index}]"), scalar_text(item)));
                    }
                }
                other => fields.push((key.clone(), scalar_text(other))),
            }
        }
        fields
    }
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

impl Driver for StripeDriver {
    fn vendor(&self) -> VendorId {
        VendorId::Stripe
    }

    fn capabilities(&self) -> DriverCapabilities {
        DriverCapabilities::read_only(PaginationStyle::Cursor, Some(MAX_PAGE_SIZE))
            .with_write()
            .with_update()
            .with_delete()
            .with_batch_operations()
            .with_relationships()
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
            if request.offset.is_some() {
                return Err(DriverError::validation(
                    "stripe lists page with starting_after cursors, offsets are not accepted",
                )
                .with_detail("parameter", "offset"));
            }
            let limit = validate_limit(request.limit.unwrap_or(MAX_PAGE_SIZE), MAX_PAGE_SIZE)?;

            let url = self.transport.join(&Self::endpoint_for(object));
            let value = self
                .transport
                .send_json(HttpRequest::get(url).with_query("limit", limit.to_string()))
                .await?;
            Ok(envelope::extract_records(&value))
        })
    }

    fn create<'a>(&'a self, object: &'a str, data: &'a Record) -> DriverFuture<'a, Record> {
        Box::pin(async move {
            let object = Self::validate_object(object)?;
            let url = self.transport.join(&Self::endpoint_for(object));
            let request =
                HttpRequest::post(url).with_body(HttpBody::Form(Self::form_fields(data)));

            let value = self.transport.send_json(request).await?;
            first_record(envelope::extract_records(&value), "create")
        })
    }

    fn update<'a>(
        &'a self,
        object: &'a str,
        id: &'a str,
        data: &'a Record,
    ) -> DriverFuture<'a, Record> {
        Box::pin(async move {
            let object = Self::validate_object(object)?;
            let url = self
                .transport
                .join(&format!("{}/{}", Self::endpoint_for(object), urlencoding::encode(id)));
            let request =
                HttpRequest::post(url).with_body(HttpBody::Form(Self::form_fields(data)));

            let value = self.transport.send_json(request).await?;
            first_record(envelope::extract_records(&value), "update")
        })
    }

    fn delete<'a>(&'a self, object: &'a str, id: &'a str) -> DriverFuture<'a, bool> {
        Box::pin(async move {
            let object = Self::validate_object(object)?;
            let url = self
                .transport
                .join(&format!("{}/{}", Self::endpoint_for(object), urlencoding::encode(id)));
            let value = self
                .transport
                .send_json(HttpRequest::new(HttpMethod::Delete, url))
                .await?;

            Ok(value.get("deleted").and_then(Value::as_bool).unwrap_or(true))
        })
    }

    fn fetch_page<'a>(&'a self, request: &'a PageRequest) -> DriverFuture<'a, Page> {
        Box::pin(async move {
            let object = Self::validate_object(&request.query)?;
            let batch_size = validate_limit(request.batch_size, MAX_PAGE_SIZE)?;

            let url = self.transport.join(&Self::endpoint_for(object));
            let mut http_request =
                HttpRequest::get(url).with_query("limit", batch_size.to_string());

            match &request.cursor {
                PageCursor::Start => {}
                PageCursor::Token(last_id) => {
                    http_request = http_request.with_query("starting_after", last_id.clone());
                }
                other => {
                    return Err(DriverError::validation(format!(
                        "stripe pagination uses starting_after cursors, got: {other:?}"
                    )));
                }
            }

            let value = self.transport.send_json(http_request).await?;
            let records = envelope::extract_records(&value);
            let has_more = envelope::page_info(&value).has_more.unwrap_or(false);

            let next = if has_more {
                records
                    .last()
                    .and_then(|record| record.get("id"))
                    .and_then(Value::as_str)
                    .map(|id| PageCursor::Token(id.to_owned()))
            } else {
                None
            };

            Ok(Page { records, next })
        })
    }

    fn rate_limit_status(&self) -> RateLimitStatus {
        self.transport.rate_limit_status()
    }
}
