//! mPOHODA accounting driver.
//!
//! Supports three credential shapes: a static API key header, a
//! pre-issued bearer token, or OAuth2 client credentials exchanged
//! lazily against the pohoda.cz identity server.

use std::sync::{Arc, Mutex};

use serde_json::Value;

use crate::capability::{DriverCapabilities, PaginationStyle};
use crate::config::{env_or, optional_env};
use crate::driver::{Driver, DriverFuture, ReadRequest};
use crate::drivers::{first_record, validate_limit};
use crate::envelope::{self, Record};
use crate::error::DriverError;
use crate::http::{HttpAuth, HttpBody, HttpClient, HttpRequest, ReqwestHttpClient};
use crate::pagination::{Page, PageCursor, PageRequest};
use crate::schema::{field, unknown_object, FieldType, ObjectSchema};
use crate::throttle::RateLimitStatus;
use crate::transport::RestTransport;
use crate::vendor::VendorId;

const DEFAULT_BASE_URL: &str = "https://api.mpohoda.cz/v1";
const TOKEN_URL: &str = "https://ucet.pohoda.cz/connect/token";
const MAX_PAGE_SIZE: usize = 50;

const OBJECTS: [&str; 10] = [
    "Activities",
    "BusinessPartners",
    "Banks",
    "BankAccounts",
    "CashRegisters",
    "Centres",
    "Establishments",
    "Countries",
    "Currencies",
    "CityPostCodes",
];

enum Credentials {
    ApiKey(String),
    AccessToken(String),
    ClientCredentials {
        client_id: String,
        client_secret: String,
        token: Mutex<Option<String>>,
    },
}

pub struct MpohodaDriver {
    transport: RestTransport,
    credentials: Credentials,
}

impl MpohodaDriver {
    /// Resolves credentials from the environment, in order of preference:
    /// `MPOHODA_API_KEY`, `MPOHODA_ACCESS_TOKEN`, or the
    /// `MPOHODA_CLIENT_ID`/`MPOHODA_CLIENT_SECRET` pair.
    pub fn from_env() -> Result<Self, DriverError> {
        let base_url = env_or("MPOHODA_API_URL", DEFAULT_BASE_URL);
        let http: Arc<dyn HttpClient> = Arc::new(ReqwestHttpClient::new());

        if let Some(api_key) = optional_env("MPOHODA_API_KEY") {
            return Ok(Self::new(Credentials::ApiKey(api_key), base_url, http));
        }
        if let Some(token) = optional_env("MPOHODA_ACCESS_TOKEN") {
            return Ok(Self::new(Credentials::AccessToken(token), base_url, http));
        }
        if let (Some(client_id), Some(client_secret)) = (
            optional_env("MPOHODA_CLIENT_ID"),
            optional_env("MPOHODA_CLIENT_SECRET"),
        ) {
            return Ok(Self::new(
                Credentials::ClientCredentials {
                    client_id,
                    client_secret,
                    token: Mutex::new(None),
                },
                base_url,
                http,
            ));
        }

        Err(DriverError::authentication(
            "missing mpohoda credentials: set MPOHODA_API_KEY, MPOHODA_ACCESS_TOKEN, \
             or MPOHODA_CLIENT_ID and MPOHODA_CLIENT_SECRET",
        ))
    }

    pub fn with_api_key(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        http: Arc<dyn HttpClient>,
    ) -> Self {
        Self::new(Credentials::ApiKey(api_key.into()), base_url, http)
    }

    pub fn with_client_credentials(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        base_url: impl Into<String>,
        http: Arc<dyn HttpClient>,
    ) -> Self {
        Self::new(
            Credentials::ClientCredentials {
                client_id: client_id.into(),
                client_secret: client_secret.into(),
                token: Mutex::new(None),
            },
            base_url,
            http,
        )
    }

    fn new(credentials: Credentials, base_url: impl Into<String>, http: Arc<dyn HttpClient>) -> Self {
        let transport = RestTransport::new(VendorId::Mpohoda, base_url, HttpAuth::None, http);
        Self {
            transport,
            credentials,
        }
    }

    /// Resolves the auth header for the next request, exchanging client
    /// credentials for a bearer token on first use.
    async fn auth(&self) -> Result<HttpAuth, DriverError> {
        match &self.credentials {
            Credentials::ApiKey(api_key) => Ok(HttpAuth::Header {
                name: String::from("Api-Key"),
                value: api_key.clone(),
            }),
            Credentials::AccessToken(token) => Ok(HttpAuth::BearerToken(token.clone())),
            Credentials::ClientCredentials {
                client_id,
                client_secret,
                token,
            } => {
                if let Some(existing) = token.lock().unwrap_or_else(|e| e.into_inner()).clone() {
                    return Ok(HttpAuth::BearerToken(existing));
                }

                let request = HttpRequest::post(TOKEN_URL).with_body(HttpBody::Form(vec![
                    (String::from("grant_type"), String::from("client_credentials")),
                    (String::from("client_id"), client_id.clone()),
                    (String::from("client_secret"), client_secret.clone()),
                ]));

                let response = self
                    .transport
                    .send_with_auth(request, &HttpAuth::None)
                    .await?;
                if !response.is_success() {
                    return Err(DriverError::authentication(format!(
                        "token request rejected with status {}",
                        response.status
                    ))
                    .with_detail("status_code", response.status));
                }

                let value = envelope::parse_json(&response.body, response.status)?;
                let access_token = value
                    .get("access_token")
                    .and_then(Value::as_str)
                    .ok_or_else(|| {
                        DriverError::authentication("token response is missing access_token")
                    })?
                    .to_owned();

                *token.lock().unwrap_or_else(|e| e.into_inner()) = Some(access_token.clone());
                Ok(HttpAuth::BearerToken(access_token))
            }
        }
    }

    async fn send_json(&self, request: HttpRequest) -> Result<Value, DriverError> {
        let auth = self.auth().await?;
        let response = self.transport.send_with_auth(request, &auth).await?;
        if !response.is_success() {
            return Err(self.transport.error_for_status(&response));
        }
        envelope::parse_json(&response.body, response.status)
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
            String::from("name"),
            field(FieldType::String, true, "Display name"),
        );

        match object {
            "BusinessPartners" => {
                schema.insert(
                    String::from("ico"),
                    field(FieldType::String, false, "Company registration number"),
                );
                schema.insert(
                    String::from("dic"),
                    field(FieldType::String, false, "VAT identification number"),
                );
                schema.insert(
                    String::from("email"),
                    field(FieldType::String, false, "Contact email"),
                );
            }
            "BankAccounts" => {
                schema.insert(
                    String::from("accountNumber"),
                    field(FieldType::String, true, "Account number"),
                );
                schema.insert(
                    String::from("bankCode"),
                    field(FieldType::String, true, "Bank routing code"),
                );
            }
            "Currencies" => {
                schema.insert(
                    String::from("code"),
                    field(FieldType::String, true, "ISO currency code"),
                );
                schema.insert(
                    String::from("rate"),
                    field(FieldType::Float, false, "Exchange rate"),
                );
            }
            "CityPostCodes" => {
                schema.insert(
                    String::from("postCode"),
                    field(FieldType::String, true, "Postal code"),
                );
            }
            _ => {}
        }
        Ok(schema)
    }
}

impl Driver for MpohodaDriver {
    fn vendor(&self) -> VendorId {
        VendorId::Mpohoda
    }

    fn capabilities(&self) -> DriverCapabilities {
        DriverCapabilities::read_only(PaginationStyle::Hybrid, Some(MAX_PAGE_SIZE))
            .with_write()
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

            // Page numbers are 1-based; an offset maps onto the page that
            // starts at it, so it must fall on a page boundary.
            let offset = request.offset.unwrap_or(0);
            if offset % limit != 0 {
                return Err(DriverError::validation(format!(
                    "offset {offset} does not align with page size {limit}"
                ))
                .with_detail("offset", offset)
                .with_detail("limit", limit));
            }
            let page_number = offset / limit + 1;

            let http_request = HttpRequest::get(self.transport.join(object))
                .with_query("PageNumber", page_number.to_string())
                .with_query("PageSize", limit.to_string());

            let value = self.send_json(http_request).await?;
            Ok(envelope::extract_records(&value))
        })
    }

    fn create<'a>(&'a self, object: &'a str, data: &'a Record) -> DriverFuture<'a, Record> {
        Box::pin(async move {
            let object = Self::validate_object(object)?;
            let request = HttpRequest::post(self.transport.join(object))
                .with_body(HttpBody::Json(Value::Object(data.clone())));

            let value = self.send_json(request).await?;
            first_record(envelope::extract_records(&value), "create")
        })
    }

    fn fetch_page<'a>(&'a self, request: &'a PageRequest) -> DriverFuture<'a, Page> {
        Box::pin(async move {
            let object = Self::validate_object(&request.query)?;
            let batch_size = validate_limit(request.batch_size, MAX_PAGE_SIZE)?;

            let mut http_request = HttpRequest::get(self.transport.join(object))
                .with_query("PageSize", batch_size.to_string());

            match &request.cursor {
                PageCursor::Start => {}
                PageCursor::Token(token) => {
                    http_request = http_request.with_query("After", token.clone());
                }
                other => {
                    return Err(DriverError::validation(format!(
                        "mpohoda batch reads use keyset tokens, got: {other:?}"
                    )));
                }
            }

            let value = self.send_json(http_request).await?;
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

    fn api_key_driver(http: Arc<ScriptedHttpClient>) -> MpohodaDriver {
        MpohodaDriver::with_api_key("mp-key", DEFAULT_BASE_URL, http)
    }

    #[tokio::test]
    async fn read_maps_offset_to_one_based_page_number() {
        let http = ScriptedHttpClient::new(vec![Ok(HttpResponse::ok_json("{\"items\": []}"))]);
        let driver = api_key_driver(Arc::clone(&http));

        driver
            .read(
                &ReadRequest::new("BusinessPartners")
                    .with_limit(50)
                    .with_offset(100),
            )
            .await
            .expect("reads");

        let sent = http.last_request();
        assert_eq!(
            sent.headers.get("api-key").map(String::as_str),
            Some("mp-key")
        );
        assert!(sent
            .query
            .contains(&(String::from("PageNumber"), String::from("3"))));
        assert!(sent
            .query
            .contains(&(String::from("PageSize"), String::from("50"))));
    }

    #[tokio::test]
    async fn read_rejects_page_size_over_cap() {
        let http = ScriptedHttpClient::new(Vec::new());
        let driver = api_key_driver(Arc::clone(&http));

        let err = driver
            .read(&ReadRequest::new("Currencies").with_limit(51))
            .await
            .expect_err("over the cap");
        assert_eq!(err.kind(), crate::ErrorKind::Validation);
        assert_eq!(http.request_count(), 0);
    }

    #[tokio::test]
    async fn read_rejects_offsets_off_the_page_boundary() {
        let http = ScriptedHttpClient::new(Vec::new());
        let driver = api_key_driver(Arc::clone(&http));

        // Offset 25 with page size 50 cannot be served by page numbers.
        let err = driver
            .read(&ReadRequest::new("Currencies").with_limit(50).with_offset(25))
            .await
            .expect_err("misaligned offset");

        assert_eq!(err.kind(), crate::ErrorKind::Validation);
        assert_eq!(err.detail("offset"), Some(&Value::from(25)));
        assert_eq!(http.request_count(), 0);
    }

    #[tokio::test]
    async fn client_credentials_fetch_token_once() {
        let http = ScriptedHttpClient::new(vec![
            Ok(HttpResponse::ok_json(
                "{\"access_token\": \"tok-1\", \"token_type\": \"Bearer\", \"expires_in\": 3600}",
            )),
            Ok(HttpResponse::ok_json("{\"items\": []}")),
            Ok(HttpResponse::ok_json("{\"items\": []}")),
        ]);
        let driver = MpohodaDriver::with_client_credentials(
            "client-1",
            "secret-1",
            DEFAULT_BASE_URL,
            Arc::clone(&http) as Arc<dyn HttpClient>,
        );

        driver
            .read(&ReadRequest::new("Banks"))
            .await
            .expect("first read");
        driver
            .read(&ReadRequest::new("Banks"))
            .await
            .expect("second read");

        let requests = http.requests();
        assert_eq!(requests.len(), 3);
        assert_eq!(requests[0].url, TOKEN_URL);
        let Some(HttpBody::Form(fields)) = &requests[0].body else {
            panic!("expected form body");
        };
        assert!(fields.contains(&(
            String::from("grant_type"),
            String::from("client_credentials")
        )));
        assert_eq!(
            requests[1].headers.get("authorization").map(String::as_str),
            Some("Bearer tok-1")
        );
        assert_eq!(
            requests[2].headers.get("authorization").map(String::as_str),
            Some("Bearer tok-1")
        );
    }

    #[tokio::test]
    async fn token_response_without_access_token_is_an_auth_error() {
        let http = ScriptedHttpClient::new(vec![Ok(HttpResponse::ok_json(
            "{\"error\": \"invalid_client\"}",
        ))]);
        let driver = MpohodaDriver::with_client_credentials(
            "client-1",
            "wrong",
            DEFAULT_BASE_URL,
            http,
        );

        let err = driver
            .read(&ReadRequest::new("Banks"))
            .await
            .expect_err("no token");
        assert_eq!(err.kind(), crate::ErrorKind::Authentication);
    }

    #[tokio::test]
    async fn batch_reader_switches_to_keyset_tokens() {
        let http = ScriptedHttpClient::new(vec![
            Ok(HttpResponse::ok_json(
                "{\"items\": [{\"id\": \"1\"}, {\"id\": \"2\"}], \"pagination\": {\"pageToken\": \"after-2\"}}",
            )),
            Ok(HttpResponse::ok_json("{\"items\": [{\"id\": \"3\"}]}")),
        ]);
        let driver = api_key_driver(Arc::clone(&http));

        let reader = BatchReader::new(&driver, "Centres", 2).expect("valid");
        let all = reader.collect_all().await.expect("collects");

        assert_eq!(all.len(), 3);
        let second = http.last_request();
        assert!(second
            .query
            .contains(&(String::from("After"), String::from("after-2"))));
        assert!(!second
            .query
            .iter()
            .any(|(name, _)| name == "PageNumber"));
    }

    #[tokio::test]
    async fn unknown_object_suggests_close_names() {
        let http = ScriptedHttpClient::new(Vec::new());
        let driver = api_key_driver(http);

        let err = driver.get_fields("partners").await.expect_err("unknown");
        assert_eq!(err.kind(), crate::ErrorKind::ObjectNotFound);
        assert_eq!(
            err.detail("did_you_mean"),
            Some(&serde_json::json!(["BusinessPartners"]))
        );
    }
}
