//! Amplitude analytics driver.
//!
//! Reads go through the export API; event ingestion and user property
//! updates use the HTTP V2 and Identify APIs.

use std::sync::Arc;

use serde_json::{json, Value};

use crate::capability::{DriverCapabilities, PaginationStyle};
use crate::config::{env_or, required_env};
use crate::driver::{Driver, DriverFuture, ReadRequest};
use crate::envelope::{self, Record};
use crate::error::DriverError;
use crate::http::{HttpAuth, HttpBody, HttpClient, HttpRequest, ReqwestHttpClient};
use crate::schema::{field, unknown_object, FieldType, ObjectSchema};
use crate::throttle::RateLimitStatus;
use crate::transport::RestTransport;
use crate::vendor::VendorId;

const DEFAULT_BASE_URL: &str = "https://amplitude.com";
const MAX_PAGE_SIZE: usize = 2000;

const OBJECTS: [&str; 4] = ["events", "users", "user_properties", "annotations"];

pub struct AmplitudeDriver {
    transport: RestTransport,
    api_key: String,
}

impl AmplitudeDriver {
    /// Reads `AMPLITUDE_API_KEY` (and optionally `AMPLITUDE_API_URL`) from
    /// the environment.
    pub fn from_env() -> Result<Self, DriverError> {
        let api_key = required_env("AMPLITUDE_API_KEY")?;
        let base_url = env_or("AMPLITUDE_API_URL", DEFAULT_BASE_URL);
        Ok(Self::new(api_key, base_url, Arc::new(ReqwestHttpClient::new())))
    }

    pub fn new(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        http: Arc<dyn HttpClient>,
    ) -> Self {
        let api_key = api_key.into();
        let transport = RestTransport::new(
            VendorId::Amplitude,
            base_url,
            HttpAuth::BearerToken(api_key.clone()),
            http,
        );
        Self { transport, api_key }
    }

    fn schema_for(object: &str) -> Result<ObjectSchema, DriverError> {
        let mut schema = ObjectSchema::new();
        match object {
            "events" => {
                schema.insert(
                    String::from("event_type"),
                    field(FieldType::String, true, "Event name"),
                );
                schema.insert(
                    String::from("user_id"),
                    field(FieldType::String, false, "Acting user identifier"),
                );
                schema.insert(
                    String::from("device_id"),
                    field(FieldType::String, false, "Device identifier"),
                );
                schema.insert(
                    String::from("time"),
                    field(FieldType::Integer, false, "Event timestamp in epoch milliseconds"),
                );
                schema.insert(
                    String::from("event_properties"),
                    field(FieldType::Object, false, "Arbitrary event properties"),
                );
            }
            "users" => {
                schema.insert(
                    String::from("user_id"),
                    field(FieldType::String, true, "User identifier"),
                );
                schema.insert(
                    String::from("amplitude_id"),
                    field(FieldType::Integer, false, "Internal Amplitude identifier"),
                );
                schema.insert(
                    String::from("country"),
                    field(FieldType::String, false, "Last seen country"),
                );
                schema.insert(
                    String::from("last_seen"),
                    field(FieldType::DateTime, false, "Last activity timestamp"),
                );
            }
            "user_properties" => {
                schema.insert(
                    String::from("user_id"),
                    field(FieldType::String, true, "User identifier"),
                );
                schema.insert(
                    String::from("user_properties"),
                    field(FieldType::Object, true, "Property map to apply"),
                );
            }
            "annotations" => {
                schema.insert(
                    String::from("id"),
                    field(FieldType::Integer, false, "Annotation identifier"),
                );
                schema.insert(
                    String::from("date"),
                    field(FieldType::DateTime, true, "Annotation date"),
                );
                schema.insert(
                    String::from("label"),
                    field(FieldType::String, true, "Annotation label"),
                );
                schema.insert(
                    String::from("details"),
                    field(FieldType::String, false, "Free-form details"),
                );
            }
            other => return Err(unknown_object(other, &OBJECTS)),
        }
        Ok(schema)
    }

    /// Uploads a batch of events in one ingestion call. The HTTP V2 API
    /// accepts up to 2000 events per request.
    pub async fn create_batch(&self, events: &[Record]) -> Result<Record, DriverError> {
        if events.is_empty() {
            return Err(DriverError::validation("event batch must not be empty")
                .with_detail("parameter", "events"));
        }
        if events.len() > MAX_PAGE_SIZE {
            return Err(DriverError::validation(format!(
                "event batch cannot exceed {MAX_PAGE_SIZE} events (got: {})",
                events.len()
            ))
            .with_detail("provided", events.len())
            .with_detail("maximum", MAX_PAGE_SIZE));
        }

        let body = json!({
            "api_key": self.api_key,
            "events": events
                .iter()
                .map(|event| Value::Object(event.clone()))
                .collect::<Vec<_>>(),
        });

        let url = self.transport.join("/2/httpapi");
        let value = self
            .transport
            .send_json(HttpRequest::post(url).with_body(HttpBody::Json(body)))
            .await?;

        Ok(envelope::into_record(value))
    }
}

impl Driver for AmplitudeDriver {
    fn vendor(&self) -> VendorId {
        VendorId::Amplitude
    }

    fn capabilities(&self) -> DriverCapabilities {
        DriverCapabilities::read_only(PaginationStyle::None, Some(MAX_PAGE_SIZE))
            .with_write()
            .with_update()
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
            let query = request.query.trim();
            if query.is_empty() {
                return Err(DriverError::query_syntax(
                    "export query must not be empty",
                ));
            }

            let url = self.transport.join("/api/2/export");
            let value = self
                .transport
                .send_json(HttpRequest::get(url).with_query("q", query))
                .await?;

            let mut records = envelope::extract_records(&value);
            if let Some(offset) = request.offset {
                records = records.into_iter().skip(offset).collect();
            }
            if let Some(limit) = request.limit {
                records.truncate(limit);
            }
            Ok(records)
        })
    }

    fn create<'a>(&'a self, object: &'a str, data: &'a Record) -> DriverFuture<'a, Record> {
        Box::pin(async move {
            if object != "events" {
                return Err(DriverError::not_supported(
                    "amplitude only accepts event writes",
                )
                .with_detail("object", object));
            }

            self.create_batch(std::slice::from_ref(data)).await
        })
    }

    fn update<'a>(
        &'a self,
        object: &'a str,
        id: &'a str,
        data: &'a Record,
    ) -> DriverFuture<'a, Record> {
        Box::pin(async move {
            if object != "users" && object != "user_properties" {
                return Err(DriverError::not_supported(
                    "amplitude updates apply to user properties only",
                )
                .with_detail("object", object));
            }

            let identification = json!({
                "user_id": id,
                "user_properties": Value::Object(data.clone()),
            });

            let url = self.transport.join("/identify");
            let request = HttpRequest::post(url).with_body(HttpBody::Form(vec![
                (String::from("api_key"), self.api_key.clone()),
                (String::from("identification"), identification.to_string()),
            ]));

            let value = self.transport.send_json(request).await?;
            Ok(envelope::into_record(value))
        })
    }

    fn fetch_page<'a>(
        &'a self,
        request: &'a crate::pagination::PageRequest,
    ) -> DriverFuture<'a, crate::pagination::Page> {
        Box::pin(async move {
            // The export API returns the full result in one response; serve
            // it as a single page.
            match request.cursor {
                crate::pagination::PageCursor::Start => {
                    let read = ReadRequest::new(request.query.clone());
                    let records = self.read(&read).await?;
                    Ok(crate::pagination::Page::last(records))
                }
                _ => Ok(crate::pagination::Page::last(Vec::new())),
            }
        })
    }

    fn rate_limit_status(&self) -> RateLimitStatus {
        self.transport.rate_limit_status()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::{HttpMethod, HttpResponse};
    use crate::testing::ScriptedHttpClient;

    fn driver(http: Arc<ScriptedHttpClient>) -> AmplitudeDriver {
        AmplitudeDriver::new("amp-key", DEFAULT_BASE_URL, http)
    }

    #[tokio::test]
    async fn empty_query_is_rejected_before_dispatch() {
        let http = ScriptedHttpClient::new(Vec::new());
        let driver = driver(Arc::clone(&http));

        let err = driver
            .read(&ReadRequest::new("  "))
            .await
            .expect_err("empty query");

        assert_eq!(err.kind(), crate::ErrorKind::QuerySyntax);
        assert_eq!(http.request_count(), 0);
    }

    #[tokio::test]
    async fn read_hits_export_endpoint_with_query_param() {
        let http = ScriptedHttpClient::new(vec![Ok(HttpResponse::ok_json(
            "{\"data\": [{\"event_type\": \"signup\"}]}",
        ))]);
        let driver = driver(Arc::clone(&http));

        let records = driver
            .read(&ReadRequest::new("event_type=signup"))
            .await
            .expect("reads");

        assert_eq!(records.len(), 1);
        let sent = http.last_request();
        assert!(sent.url.ends_with("/api/2/export"));
        assert_eq!(
            sent.query,
            vec![(String::from("q"), String::from("event_type=signup"))]
        );
    }

    #[tokio::test]
    async fn create_wraps_event_in_ingestion_payload() {
        let http = ScriptedHttpClient::new(vec![Ok(HttpResponse::ok_json(
            "{\"code\": 200, \"events_ingested\": 1}",
        ))]);
        let driver = driver(Arc::clone(&http));

        let mut event = Record::new();
        event.insert(String::from("event_type"), Value::from("signup"));

        let result = driver.create("events", &event).await.expect("creates");
        assert_eq!(result.get("events_ingested"), Some(&Value::from(1)));

        let sent = http.last_request();
        assert_eq!(sent.method, HttpMethod::Post);
        let Some(HttpBody::Json(body)) = sent.body else {
            panic!("expected JSON body");
        };
        assert_eq!(body["api_key"], "amp-key");
        assert_eq!(body["events"][0]["event_type"], "signup");
    }

    #[tokio::test]
    async fn create_batch_uploads_every_event_at_once() {
        let http = ScriptedHttpClient::new(vec![Ok(HttpResponse::ok_json(
            "{\"code\": 200, \"events_ingested\": 3}",
        ))]);
        let driver = driver(Arc::clone(&http));

        let events: Vec<Record> = (0..3)
            .map(|index| {
                let mut event = Record::new();
                event.insert(String::from("event_type"), Value::from("page_view"));
                event.insert(String::from("time"), Value::from(index));
                event
            })
            .collect();

        let result = driver.create_batch(&events).await.expect("uploads");
        assert_eq!(result.get("events_ingested"), Some(&Value::from(3)));

        let Some(HttpBody::Json(body)) = http.last_request().body else {
            panic!("expected JSON body");
        };
        assert_eq!(body["events"].as_array().map(Vec::len), Some(3));
    }

    #[tokio::test]
    async fn create_batch_rejects_an_empty_batch() {
        let http = ScriptedHttpClient::new(Vec::new());
        let driver = driver(Arc::clone(&http));

        let err = driver.create_batch(&[]).await.expect_err("empty batch");
        assert_eq!(err.kind(), crate::ErrorKind::Validation);
        assert_eq!(http.request_count(), 0);
    }

    #[tokio::test]
    async fn create_rejects_non_event_objects() {
        let http = ScriptedHttpClient::new(Vec::new());
        let driver = driver(http);

        let err = driver
            .create("annotations", &Record::new())
            .await
            .expect_err("unsupported");
        assert_eq!(err.kind(), crate::ErrorKind::NotSupported);
    }

    #[tokio::test]
    async fn update_sends_identify_form() {
        let http = ScriptedHttpClient::new(vec![Ok(HttpResponse::ok_json("\"success\""))]);
        let driver = driver(Arc::clone(&http));

        let mut props = Record::new();
        props.insert(String::from("plan"), Value::from("pro"));

        driver
            .update("users", "user-42", &props)
            .await
            .expect("updates");

        let sent = http.last_request();
        let Some(HttpBody::Form(fields)) = sent.body else {
            panic!("expected form body");
        };
        assert_eq!(fields[0], (String::from("api_key"), String::from("amp-key")));
        assert!(fields[1].1.contains("user-42"));
        assert!(fields[1].1.contains("\"plan\":\"pro\""));
    }

    #[tokio::test]
    async fn unknown_object_error_carries_suggestions() {
        let http = ScriptedHttpClient::new(Vec::new());
        let driver = driver(http);

        let err = driver.get_fields("event").await.expect_err("near miss");
        assert_eq!(err.kind(), crate::ErrorKind::ObjectNotFound);
        assert_eq!(
            err.detail("did_you_mean"),
            Some(&serde_json::json!(["events"]))
        );
    }

    #[test]
    fn capabilities_have_no_pagination() {
        let http = ScriptedHttpClient::new(Vec::new());
        let driver = driver(http);
        let caps = driver.capabilities();

        assert_eq!(caps.pagination, PaginationStyle::None);
        assert!(caps.write);
        assert!(!caps.delete);
        assert_eq!(caps.max_page_size, Some(2000));
    }
}
