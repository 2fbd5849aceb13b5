//! PostHog product analytics driver.
//!
//! Endpoints are scoped under `environments/{project_id}/` and pages are
//! linked through absolute `next` URLs.

use std::sync::Arc;

use serde_json::Value;

use crate::capability::{DriverCapabilities, PaginationStyle};
use crate::config::{env_or, optional_env, required_env};
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

const DEFAULT_BASE_URL: &str = "https://app.posthog.com/api";
const MAX_PAGE_SIZE: usize = 100;
const DEFAULT_LIMIT: usize = 50;

const OBJECTS: [&str; 10] = [
    "batch_exports",
    "dashboards",
    "datasets",
    "dataset_items",
    "desktop_recordings",
    "error_tracking",
    "endpoints",
    "persons",
    "events",
    "feature_flags",
];

pub struct PosthogDriver {
    transport: RestTransport,
    project_id: String,
}

impl PosthogDriver {
    /// Reads `POSTHOG_API_KEY` (and optionally `POSTHOG_API_URL` and
    /// `POSTHOG_PROJECT_ID`) from the environment.
    pub fn from_env() -> Result<Self, DriverError> {
        let api_key = required_env("POSTHOG_API_KEY")?;
        let base_url = env_or("POSTHOG_API_URL", DEFAULT_BASE_URL);
        let project_id = optional_env("POSTHOG_PROJECT_ID");
        Ok(Self::new(
            api_key,
            base_url,
            project_id,
            Arc::new(ReqwestHttpClient::new()),
        ))
    }

    pub fn new(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        project_id: Option<String>,
        http: Arc<dyn HttpClient>,
    ) -> Self {
        let transport = RestTransport::new(
            VendorId::Posthog,
            base_url,
            HttpAuth::BearerToken(api_key.into()),
            http,
        );
        Self {
            transport,
            project_id: project_id.unwrap_or_else(|| String::from("default")),
        }
    }

    /// Scopes a relative endpoint under the configured project environment.
    /// Paths that already name an environment pass through unchanged.
    fn scoped(&self, endpoint: &str) -> String {
        let endpoint = endpoint.trim_matches('/');
        if endpoint.starts_with("environments/") {
            format!("{endpoint}/")
        } else {
            format!("environments/{}/{endpoint}/", self.project_id)
        }
    }

    fn validate_object(object: &str) -> Result<&str, DriverError> {
        let object = object.trim().trim_matches('/');
        if OBJECTS.contains(&object) {
            Ok(object)
        } else {
            Err(unknown_object(object, &OBJECTS))
        }
    }

    /// Reads accept full endpoint paths. An explicit `environments/...`
    /// prefix passes through untouched; otherwise the leading segment
    /// must name a known collection.
    fn validate_path(path: &str) -> Result<&str, DriverError> {
        let path = path.trim().trim_matches('/');
        if path.starts_with("environments/") {
            return Ok(path);
        }
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
            String::from("created_at"),
            field(FieldType::DateTime, false, "Creation timestamp"),
        );

        match object {
            "persons" => {
                schema.insert(
                    String::from("distinct_ids"),
                    field(FieldType::List, false, "Known distinct ids"),
                );
                schema.insert(
                    String::from("properties"),
                    field(FieldType::Object, false, "Person properties"),
                );
            }
            "events" => {
                schema.insert(
                    String::from("event"),
                    field(FieldType::String, true, "Event name"),
                );
                schema.insert(
                    String::from("distinct_id"),
                    field(FieldType::String, false, "Acting distinct id"),
                );
                schema.insert(
                    String::from("timestamp"),
                    field(FieldType::DateTime, false, "Event timestamp"),
                );
                schema.insert(
                    String::from("properties"),
                    field(FieldType::Object, false, "Event properties"),
                );
            }
            "feature_flags" => {
                schema.insert(
                    String::from("key"),
                    field(FieldType::String, true, "Flag key"),
                );
                schema.insert(
                    String::from("active"),
                    field(FieldType::Boolean, false, "Whether the flag is enabled"),
                );
                schema.insert(
                    String::from("filters"),
                    field(FieldType::Object, false, "Release conditions"),
                );
            }
            "dashboards" => {
                schema.insert(
                    String::from("name"),
                    field(FieldType::String, true, "Dashboard name"),
                );
                schema.insert(
                    String::from("pinned"),
                    field(FieldType::Boolean, false, "Pinned to the home page"),
                );
            }
            _ => {
                schema.insert(
                    String::from("name"),
                    field(FieldType::String, false, "Display name"),
                );
            }
        }
        Ok(schema)
    }
}

impl Driver for PosthogDriver {
    fn vendor(&self) -> VendorId {
        VendorId::Posthog
    }

    fn capabilities(&self) -> DriverCapabilities {
        DriverCapabilities::read_only(PaginationStyle::Cursor, Some(MAX_PAGE_SIZE))
            .with_write()
            .with_update()
            .with_delete()
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
            let path = Self::validate_path(&request.query)?;
            let limit = validate_limit(request.limit.unwrap_or(DEFAULT_LIMIT), MAX_PAGE_SIZE)?;

            let mut http_request = HttpRequest::get(self.transport.join(&self.scoped(path)))
                .with_query("limit", limit.to_string());
            if let Some(offset) = request.offset {
                http_request = http_request.with_query("offset", offset.to_string());
            }

            let value = self.transport.send_json(http_request).await?;
            Ok(envelope::extract_records(&value))
        })
    }

    fn create<'a>(&'a self, object: &'a str, data: &'a Record) -> DriverFuture<'a, Record> {
        Box::pin(async move {
            let object = Self::validate_object(object)?;
            let request = HttpRequest::post(self.transport.join(&self.scoped(object)))
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
            let path = self.scoped(&format!("{object}/{}", urlencoding::encode(id)));
            let request = HttpRequest::new(HttpMethod::Patch, self.transport.join(&path))
                .with_body(HttpBody::Json(Value::Object(data.clone())));

            let value = self.transport.send_json(request).await?;
            first_record(envelope::extract_records(&value), "update")
        })
    }

    fn delete<'a>(&'a self, object: &'a str, id: &'a str) -> DriverFuture<'a, bool> {
        Box::pin(async move {
            let object = Self::validate_object(object)?;
            let path = self.scoped(&format!("{object}/{}", urlencoding::encode(id)));
            let response = self
                .transport
                .send(HttpRequest::new(
                    HttpMethod::Delete,
                    self.transport.join(&path),
                ))
                .await?;

            if !response.is_success() {
                return Err(self.transport.error_for_status(&response));
            }
            Ok(true)
        })
    }

    fn fetch_page<'a>(&'a self, request: &'a PageRequest) -> DriverFuture<'a, Page> {
        Box::pin(async move {
            let http_request = match &request.cursor {
                PageCursor::Start => {
                    let path = Self::validate_path(&request.query)?;
                    let batch_size = validate_limit(request.batch_size, MAX_PAGE_SIZE)?;
                    HttpRequest::get(self.transport.join(&self.scoped(path)))
                        .with_query("limit", batch_size.to_string())
                }
                // `next` is an absolute URL carrying its own parameters.
                PageCursor::Token(url) => HttpRequest::get(self.transport.join(url)),
                other => {
                    return Err(DriverError::validation(format!(
                        "posthog pagination follows next URLs, got: {other:?}"
                    )));
                }
            };

            let value = self.transport.send_json(http_request).await?;
            let records = envelope::extract_records(&value);
            let next = envelope::page_info(&value).next_cursor;

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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::HttpResponse;
    use crate::pagination::BatchReader;
    use crate::testing::ScriptedHttpClient;

    fn driver(http: Arc<ScriptedHttpClient>) -> PosthogDriver {
        PosthogDriver::new(
            "phx_key",
            DEFAULT_BASE_URL,
            Some(String::from("123")),
            http,
        )
    }

    #[tokio::test]
    async fn read_scopes_endpoint_under_project_environment() {
        let http = ScriptedHttpClient::new(vec![Ok(HttpResponse::ok_json(
            "{\"results\": [{\"id\": \"p1\"}], \"next\": null}",
        ))]);
        let driver = driver(Arc::clone(&http));

        let records = driver
            .read(&ReadRequest::new("persons"))
            .await
            .expect("reads");

        assert_eq!(records.len(), 1);
        let sent = http.last_request();
        assert!(sent.url.ends_with("/environments/123/persons/"));
        assert!(sent
            .query
            .contains(&(String::from("limit"), String::from("50"))));
    }

    #[tokio::test]
    async fn missing_project_id_scopes_to_default_environment() {
        let http = ScriptedHttpClient::new(vec![Ok(HttpResponse::ok_json("{\"results\": []}"))]);
        let driver = PosthogDriver::new(
            "phx_key",
            DEFAULT_BASE_URL,
            None,
            Arc::clone(&http) as Arc<dyn HttpClient>,
        );

        driver
            .read(&ReadRequest::new("dashboards"))
            .await
            .expect("reads");

        assert!(http
            .last_request()
            .url
            .ends_with("/environments/default/dashboards/"));
    }

    #[tokio::test]
    async fn read_passes_explicit_environment_paths_through() {
        let http = ScriptedHttpClient::new(vec![Ok(HttpResponse::ok_json(
            "{\"results\": [{\"id\": 9}], \"next\": null}",
        ))]);
        let driver = driver(Arc::clone(&http));

        driver
            .read(&ReadRequest::new("environments/456/events"))
            .await
            .expect("reads");

        // The configured project id must not be prepended again.
        assert!(http
            .last_request()
            .url
            .ends_with("/environments/456/events/"));
    }

    #[tokio::test]
    async fn read_accepts_nested_paths_under_known_collections() {
        let http = ScriptedHttpClient::new(vec![Ok(HttpResponse::ok_json(
            "{\"results\": [{\"id\": \"act_1\"}], \"next\": null}",
        ))]);
        let driver = driver(Arc::clone(&http));

        driver
            .read(&ReadRequest::new("persons/ph_1/activity"))
            .await
            .expect("reads");

        assert!(http
            .last_request()
            .url
            .ends_with("/environments/123/persons/ph_1/activity/"));
    }

    #[tokio::test]
    async fn batch_reader_follows_next_urls() {
        let http = ScriptedHttpClient::new(vec![
            Ok(HttpResponse::ok_json(
                "{\"results\": [{\"id\": \"a\"}, {\"id\": \"b\"}], \
                  \"next\": \"https://app.posthog.com/api/environments/123/persons/?offset=2\"}",
            )),
            Ok(HttpResponse::ok_json(
                "{\"results\": [{\"id\": \"c\"}], \"next\": null}",
            )),
        ]);
        let driver = driver(Arc::clone(&http));

        let reader = BatchReader::new(&driver, "persons", 2).expect("valid");
        let all = reader.collect_all().await.expect("collects");

        assert_eq!(all.len(), 3);
        let second = http.last_request();
        assert_eq!(
            second.url,
            "https://app.posthog.com/api/environments/123/persons/?offset=2"
        );
        assert!(second.query.is_empty());
    }

    #[tokio::test]
    async fn update_patches_the_resource_path() {
        let http = ScriptedHttpClient::new(vec![Ok(HttpResponse::ok_json(
            "{\"id\": \"ff_1\", \"key\": \"beta\", \"active\": true}",
        ))]);
        let driver = driver(Arc::clone(&http));

        let mut data = Record::new();
        data.insert(String::from("active"), Value::from(true));

        let updated = driver
            .update("feature_flags", "ff_1", &data)
            .await
            .expect("updates");

        assert_eq!(updated.get("active"), Some(&Value::from(true)));
        let sent = http.last_request();
        assert_eq!(sent.method, HttpMethod::Patch);
        assert!(sent.url.ends_with("/environments/123/feature_flags/ff_1/"));
    }

    #[tokio::test]
    async fn delete_returns_true_on_no_content() {
        let http = ScriptedHttpClient::new(vec![Ok(HttpResponse::with_status(204, ""))]);
        let driver = driver(Arc::clone(&http));

        assert!(driver
            .delete("dashboards", "42")
            .await
            .expect("deletes"));
        assert_eq!(http.last_request().method, HttpMethod::Delete);
    }

    #[tokio::test]
    async fn unknown_object_is_rejected_with_suggestions() {
        let http = ScriptedHttpClient::new(Vec::new());
        let driver = driver(http);

        let err = driver
            .read(&ReadRequest::new("person"))
            .await
            .expect_err("near miss");
        assert_eq!(err.kind(), crate::ErrorKind::ObjectNotFound);
        assert_eq!(
            err.detail("did_you_mean"),
            Some(&serde_json::json!(["persons"]))
        );
    }
}
