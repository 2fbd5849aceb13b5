//! Apify platform driver.
//!
//! Full CRUD over the v2 REST API with offset pagination.

use std::sync::Arc;

use serde_json::Value;

use crate::capability::{DriverCapabilities, PaginationStyle};
use crate::config::{env_or, required_env};
use crate::driver::{Driver, DriverFuture, ReadRequest};
use crate::drivers::{first_record, validate_limit};
use crate::envelope::{self, Record};
use crate::error::DriverError;
use crate::http::{HttpAuth, HttpBody, HttpClient, HttpMethod, HttpRequest, ReqwestHttpClient};
use crate::schema::{field, unknown_object, FieldType, ObjectSchema};
use crate::throttle::RateLimitStatus;
use crate::transport::RestTransport;
use crate::vendor::VendorId;

const DEFAULT_BASE_URL: &str = "https://api.apify.com/v2";
const MAX_PAGE_SIZE: usize = 100;

const OBJECTS: [&str; 9] = [
    "actors",
    "runs",
    "datasets",
    "key-value-stores",
    "request-queues",
    "tasks",
    "webhooks",
    "schedules",
    "builds",
];

/// Object types that accept `create`.
const CREATABLE: [&str; 3] = ["tasks", "webhooks", "schedules"];

pub struct ApifyDriver {
    transport: RestTransport,
}

impl ApifyDriver {
    /// Reads `APIFY_API_TOKEN` (and optionally `APIFY_API_URL`) from the
    /// environment.
    pub fn from_env() -> Result<Self, DriverError> {
        let token = required_env("APIFY_API_TOKEN")?;
        let base_url = env_or("APIFY_API_URL", DEFAULT_BASE_URL);
        Ok(Self::new(token, base_url, Arc::new(ReqwestHttpClient::new())))
    }

    pub fn new(
        token: impl Into<String>,
        base_url: impl Into<String>,
        http: Arc<dyn HttpClient>,
    ) -> Self {
        let transport = RestTransport::new(
            VendorId::Apify,
            base_url,
            HttpAuth::BearerToken(token.into()),
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

    /// Reads accept full endpoint paths such as `datasets/{id}/items`;
    /// only the leading collection segment is checked.
    fn validate_path(path: &str) -> Result<&str, DriverError> {
        let path = path.trim().trim_matches('/');
        let root = path.split('/').next().unwrap_or(path);
        if OBJECTS.contains(&root) {
            Ok(path)
        } else {
            Err(unknown_object(root, &OBJECTS))
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
            String::from("createdAt"),
            field(FieldType::DateTime, false, "Creation timestamp"),
        );
        schema.insert(
            String::from("modifiedAt"),
            field(FieldType::DateTime, false, "Last modification timestamp"),
        );

        match object {
            "actors" => {
                schema.insert(
                    String::from("name"),
                    field(FieldType::String, true, "Actor name"),
                );
                schema.insert(
                    String::from("username"),
                    field(FieldType::String, false, "Owning account"),
                );
                schema.insert(
                    String::from("stats"),
                    field(FieldType::Object, false, "Run statistics"),
                );
            }
            "runs" => {
                schema.insert(
                    String::from("actId"),
                    field(FieldType::String, true, "Actor that produced the run"),
                );
                schema.insert(
                    String::from("status"),
                    field(FieldType::String, true, "Run status"),
                );
                schema.insert(
                    String::from("startedAt"),
                    field(FieldType::DateTime, false, "Run start timestamp"),
                );
                schema.insert(
                    String::from("finishedAt"),
                    field(FieldType::DateTime, false, "Run finish timestamp"),
                );
            }
            "datasets" => {
                schema.insert(
                    String::from("name"),
                    field(FieldType::String, false, "Dataset name"),
                );
                schema.insert(
                    String::from("itemCount"),
                    field(FieldType::Integer, false, "Stored item count"),
                );
                schema.insert(
                    String::from("cleanItemCount"),
                    field(FieldType::Integer, false, "Item count excluding hidden fields"),
                );
            }
            "key-value-stores" => {
                schema.insert(
                    String::from("name"),
                    field(FieldType::String, false, "Store name"),
                );
                schema.insert(
                    String::from("userId"),
                    field(FieldType::String, false, "Owning account identifier"),
                );
            }
            _ => {}
        }
        Ok(schema)
    }
}

impl Driver for ApifyDriver {
    fn vendor(&self) -> VendorId {
        VendorId::Apify
    }

    fn capabilities(&self) -> DriverCapabilities {
        DriverCapabilities::read_only(PaginationStyle::Offset, Some(MAX_PAGE_SIZE))
            .with_write()
            .with_update()
            .with_delete()
            .with_batch_operations()
            .with_streaming()
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
            let path = Self::validate_path(&request.query)?;
            let limit = validate_limit(request.limit.unwrap_or(MAX_PAGE_SIZE), MAX_PAGE_SIZE)?;

            let mut http_request = HttpRequest::get(self.transport.join(path))
                .with_query("limit", limit.to_string());
            if let Some(offset) = request.offset {
                http_request = http_request.with_query("offset", offset.to_string());
            }

            let value = self.transport.send_json(http_request).await?;
            // List envelopes nest the items under `data`.
            let payload = value.get("data").cloned().unwrap_or(value);
            Ok(envelope::extract_records(&payload))
        })
    }

    fn create<'a>(&'a self, object: &'a str, data: &'a Record) -> DriverFuture<'a, Record> {
        Box::pin(async move {
            let object = Self::validate_object(object)?;
            if !CREATABLE.contains(&object) {
                return Err(DriverError::not_supported(format!(
                    "apify does not support creating {object}, only: {}",
                    CREATABLE.join(", ")
                ))
                .with_detail("object", object));
            }

            let request = HttpRequest::post(self.transport.join(object))
                .with_body(HttpBody::Json(Value::Object(data.clone())));
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
                .join(&format!("{object}/{}", urlencoding::encode(id)));
            let request = HttpRequest::new(HttpMethod::Put, url)
                .with_body(HttpBody::Json(Value::Object(data.clone())));

            let value = self.transport.send_json(request).await?;
            first_record(envelope::extract_records(&value), "update")
        })
    }

    fn delete<'a>(&'a self, object: &'a str, id: &'a str) -> DriverFuture<'a, bool> {
        Box::pin(async move {
            let object = Self::validate_object(object)?;
            let url = self
                .transport
                .join(&format!("{object}/{}", urlencoding::encode(id)));
            let response = self
                .transport
                .send(HttpRequest::new(HttpMethod::Delete, url))
                .await?;

            if !response.is_success() {
                return Err(self.transport.error_for_status(&response));
            }
            Ok(true)
        })
    }

    fn rate_limit_status(&self) -> RateLimitStatus {
        self.transport.rate_limit_status()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::HttpResponse;
    use crate::pagination::BatchReader;
    use crate::testing::ScriptedHttpClient;

    fn driver(http: Arc<ScriptedHttpClient>) -> ApifyDriver {
        ApifyDriver::new("apify-token", DEFAULT_BASE_URL, http)
    }

    #[tokio::test]
    async fn read_sends_limit_and_offset() {
        let http = ScriptedHttpClient::new(vec![Ok(HttpResponse::ok_json(
            "{\"data\": {\"items\": [{\"id\": \"act_1\"}], \"total\": 1}}",
        ))]);
        let driver = driver(Arc::clone(&http));

        let records = driver
            .read(&ReadRequest::new("actors").with_limit(25).with_offset(50))
            .await
            .expect("reads");

        assert_eq!(records.len(), 1);
        let sent = http.last_request();
        assert!(sent.url.ends_with("/actors"));
        assert!(sent
            .query
            .contains(&(String::from("limit"), String::from("25"))));
        assert!(sent
            .query
            .contains(&(String::from("offset"), String::from("50"))));
    }

    #[tokio::test]
    async fn read_accepts_nested_endpoint_paths() {
        let http = ScriptedHttpClient::new(vec![Ok(HttpResponse::ok_json(
            "{\"data\": {\"items\": [{\"url\": \"https://example.com\"}]}}",
        ))]);
        let driver = driver(Arc::clone(&http));

        let records = driver
            .read(&ReadRequest::new("datasets/xyz/items"))
            .await
            .expect("reads");

        assert_eq!(records.len(), 1);
        assert!(http.last_request().url.ends_with("/datasets/xyz/items"));
    }

    #[tokio::test]
    async fn read_rejects_paths_under_unknown_collections() {
        let http = ScriptedHttpClient::new(Vec::new());
        let driver = driver(Arc::clone(&http));

        let err = driver
            .read(&ReadRequest::new("exports/xyz/items"))
            .await
            .expect_err("unknown collection");

        assert_eq!(err.kind(), crate::ErrorKind::ObjectNotFound);
        assert_eq!(http.request_count(), 0);
    }

    #[tokio::test]
    async fn read_rejects_out_of_range_limit() {
        let http = ScriptedHttpClient::new(Vec::new());
        let driver = driver(Arc::clone(&http));

        let err = driver
            .read(&ReadRequest::new("actors").with_limit(101))
            .await
            .expect_err("over the cap");

        assert_eq!(err.kind(), crate::ErrorKind::Validation);
        assert_eq!(http.request_count(), 0);
    }

    #[tokio::test]
    async fn read_rejects_unknown_object() {
        let http = ScriptedHttpClient::new(Vec::new());
        let driver = driver(http);

        let err = driver
            .read(&ReadRequest::new("actresses"))
            .await
            .expect_err("unknown");

        assert_eq!(err.kind(), crate::ErrorKind::ObjectNotFound);
        assert_eq!(
            err.detail("did_you_mean"),
            Some(&serde_json::json!(["actors"]))
        );
    }

    #[tokio::test]
    async fn create_is_limited_to_writable_objects() {
        let http = ScriptedHttpClient::new(Vec::new());
        let driver = driver(http);

        let err = driver
            .create("actors", &Record::new())
            .await
            .expect_err("actors are not creatable");
        assert_eq!(err.kind(), crate::ErrorKind::NotSupported);
    }

    #[tokio::test]
    async fn create_posts_to_collection_and_unwraps_data() {
        let http = ScriptedHttpClient::new(vec![Ok(HttpResponse::with_status(
            201,
            "{\"data\": {\"id\": \"task_1\", \"name\": \"nightly\"}}",
        ))]);
        let driver = driver(Arc::clone(&http));

        let mut data = Record::new();
        data.insert(String::from("name"), Value::from("nightly"));

        let created = driver.create("tasks", &data).await.expect("creates");
        assert_eq!(created.get("id"), Some(&Value::from("task_1")));

        let sent = http.last_request();
        assert_eq!(sent.method, HttpMethod::Post);
        assert!(sent.url.ends_with("/tasks"));
    }

    #[tokio::test]
    async fn update_puts_to_resource_path() {
        let http = ScriptedHttpClient::new(vec![Ok(HttpResponse::ok_json(
            "{\"data\": {\"id\": \"wh_1\", \"isAdHoc\": true}}",
        ))]);
        let driver = driver(Arc::clone(&http));

        let updated = driver
            .update("webhooks", "wh_1", &Record::new())
            .await
            .expect("updates");

        assert_eq!(updated.get("id"), Some(&Value::from("wh_1")));
        let sent = http.last_request();
        assert_eq!(sent.method, HttpMethod::Put);
        assert!(sent.url.ends_with("/webhooks/wh_1"));
    }

    #[tokio::test]
    async fn delete_returns_true_on_success() {
        let http = ScriptedHttpClient::new(vec![Ok(HttpResponse::with_status(204, ""))]);
        let driver = driver(Arc::clone(&http));

        let deleted = driver
            .delete("schedules", "sched_1")
            .await
            .expect("deletes");
        assert!(deleted);

        let sent = http.last_request();
        assert_eq!(sent.method, HttpMethod::Delete);
    }

    #[tokio::test]
    async fn batch_reader_pages_by_offset() {
        let http = ScriptedHttpClient::new(vec![
            Ok(HttpResponse::ok_json(
                "{\"data\": {\"items\": [{\"id\": \"a\"}, {\"id\": \"b\"}]}}",
            )),
            Ok(HttpResponse::ok_json(
                "{\"data\": {\"items\": [{\"id\": \"c\"}]}}",
            )),
        ]);
        let driver = driver(Arc::clone(&http));

        let reader = BatchReader::new(&driver, "runs", 2).expect("valid");
        let all = reader.collect_all().await.expect("collects");

        assert_eq!(all.len(), 3);
        assert_eq!(http.request_count(), 2);
        let second = http.last_request();
        assert!(second
            .query
            .contains(&(String::from("offset"), String::from("2"))));
    }
}
