//! Shared REST dispatch: rate gating, retries, and status-to-error mapping.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

use crate::envelope;
use crate::error::DriverError;
use crate::http::{HttpAuth, HttpClient, HttpError, HttpErrorKind, HttpRequest, HttpResponse};
use crate::policy::VendorPolicy;
use crate::retry::RetryPolicy;
use crate::throttle::{RateGate, RateLimitStatus};
use crate::vendor::VendorId;

const USER_AGENT: &str = concat!("drivekit/", env!("CARGO_PKG_VERSION"));

/// REST dispatcher shared by every driver. Holds the vendor's base URL,
/// credentials, local rate gate, and retry policy.
pub struct RestTransport {
    vendor: VendorId,
    base_url: String,
    auth: HttpAuth,
    retry: RetryPolicy,
    gate: RateGate,
    http: Arc<dyn HttpClient>,
}

impl RestTransport {
    pub fn new(
        vendor: VendorId,
        base_url: impl Into<String>,
        auth: HttpAuth,
        http: Arc<dyn HttpClient>,
    ) -> Self {
        Self::with_policy(vendor, base_url, auth, VendorPolicy::default_for(vendor), http)
    }

    pub fn with_policy(
        vendor: VendorId,
        base_url: impl Into<String>,
        auth: HttpAuth,
        policy: VendorPolicy,
        http: Arc<dyn HttpClient>,
    ) -> Self {
        Self {
            vendor,
            base_url: base_url.into().trim_end_matches('/').to_owned(),
            auth,
            retry: policy.retry.clone(),
            gate: RateGate::from_policy(&policy),
            http,
        }
    }

    pub fn vendor(&self) -> VendorId {
        self.vendor
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn rate_limit_status(&self) -> RateLimitStatus {
        self.gate.status()
    }

    /// Joins a path onto the base URL. Absolute URLs pass through verbatim,
    /// which is how cursor styles that hand back full next-page URLs work.
    pub fn join(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            path.to_owned()
        } else {
            format!("{}/{}", self.base_url, path.trim_start_matches('/'))
        }
    }

    /// Dispatches with the transport's configured credentials.
    pub async fn send(&self, request: HttpRequest) -> Result<HttpResponse, DriverError> {
        let auth = self.auth.clone();
        self.send_with_auth(request, &auth).await
    }

    /// Dispatches with explicit credentials. Token-endpoint calls pass
    /// `HttpAuth::None` here before the real credentials exist.
    pub async fn send_with_auth(
        &self,
        request: HttpRequest,
        auth: &HttpAuth,
    ) -> Result<HttpResponse, DriverError> {
        let request = request
            .with_header("accept", "application/json")
            .with_header("user-agent", USER_AGENT)
            .with_auth(auth);

        let attempts = self.retry.max_retries.max(1);
        let mut attempt: u32 = 0;

        loop {
            while let Err(pause) = self.gate.acquire() {
                log::debug!(
                    "{} local rate budget exhausted, pausing {}ms",
                    self.vendor,
                    pause.as_millis()
                );
                tokio::time::sleep(pause).await;
            }

            log::debug!(
                "{} {} {} (attempt {}/{attempts})",
                self.vendor,
                request.method,
                request.url,
                attempt + 1
            );

            match self.http.execute(request.clone()).await {
                Ok(response) => {
                    if response.is_success() || !self.retry.should_retry_status(response.status) {
                        return Ok(response);
                    }
                    if attempt + 1 >= attempts {
                        return Ok(response);
                    }

                    let delay = self.retry_delay(&response, attempt);
                    log::debug!(
                        "{} got {} from {}, retrying in {}ms",
                        self.vendor,
                        response.status,
                        request.url,
                        delay.as_millis()
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(error) => {
                    if !self.is_transient(&error) || attempt + 1 >= attempts {
                        return Err(self.map_http_error(&error));
                    }

                    let delay = self.retry.delay_for_attempt(attempt);
                    log::debug!(
                        "{} transport failure ({}), retrying in {}ms",
                        self.vendor,
                        error,
                        delay.as_millis()
                    );
                    tokio::time::sleep(delay).await;
                }
            }

            attempt += 1;
        }
    }

    /// Dispatches and parses the response body, mapping non-2xx statuses to
    /// the driver error taxonomy.
    pub async fn send_json(&self, request: HttpRequest) -> Result<Value, DriverError> {
        let response = self.send(request).await?;
        if !response.is_success() {
            return Err(self.error_for_status(&response));
        }

        envelope::parse_json(&response.body, response.status)
    }

    /// Maps a non-success response to the taxonomy error for its status.
    pub fn error_for_status(&self, response: &HttpResponse) -> DriverError {
        let message = remote_message(&response.body);
        let status = response.status;

        let error = match status {
            401 | 403 => DriverError::authentication(format!(
                "authentication failed for {}: {message}",
                self.vendor
            )),
            404 => DriverError::object_not_found(format!("resource not found: {message}")),
            400 => DriverError::query_syntax(format!("request rejected: {message}")),
            422 => DriverError::validation(format!("validation failed: {message}")),
            429 => {
                let mut error =
                    DriverError::rate_limited(format!("{} rate limit exceeded", self.vendor));
                if let Some(seconds) = response.retry_after() {
                    error = error.with_detail("retry_after", seconds);
                }
                error
            }
            status if status >= 500 => DriverError::connection(format!(
                "{} API returned server error {status}: {message}",
                self.vendor
            )),
            _ => DriverError::query_syntax(format!(
                "unexpected status {status} from {}: {message}",
                self.vendor
            )),
        };

        error.with_detail("status_code", status)
    }

    fn retry_delay(&self, response: &HttpResponse, attempt: u32) -> Duration {
        if self.retry.honor_retry_after {
            if let Some(seconds) = response.retry_after() {
                return Duration::from_secs(seconds);
            }
        }
        self.retry.delay_for_attempt(attempt)
    }

    fn is_transient(&self, error: &HttpError) -> bool {
        match error.kind() {
            HttpErrorKind::Timeout => self.retry.retry_on_timeout,
            HttpErrorKind::Connect => self.retry.retry_on_connect,
            HttpErrorKind::Other => false,
        }
    }

    fn map_http_error(&self, error: &HttpError) -> DriverError {
        match error.kind() {
            HttpErrorKind::Timeout => {
                DriverError::timeout(format!("{} request timed out: {error}", self.vendor))
            }
            HttpErrorKind::Connect | HttpErrorKind::Other => DriverError::connection(format!(
                "failed to reach {} API: {error}",
                self.vendor
            )),
        }
    }
}

/// Pulls a human-readable message out of a JSON error body, falling back
/// to a truncated raw body.
fn remote_message(body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<Value>(body) {
        for key in ["message", "error", "detail", "error_description"] {
            match value.get(key) {
                Some(Value::String(text)) if !text.is_empty() => return text.clone(),
                Some(Value::Object(inner)) => {
                    if let Some(Value::String(text)) = inner.get("message") {
                        if !text.is_empty() {
                            return text.clone();
                        }
                    }
                }
                _ => {}
            }
        }
    }

    let trimmed = body.trim();
    if trimmed.is_empty() {
        return String::from("(empty response body)");
    }

    let mut end = trimmed.len().min(200);
    while !trimmed.is_char_boundary(end) {
        end -= 1;
    }
    trimmed[..end].to_owned()
}
