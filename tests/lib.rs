// Shared fixtures for the driver behavior tests.

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

pub use drivekit_core::{
    AmplitudeDriver, ApifyDriver, BatchReader, Driver, DriverError, ErrorKind, FidooDriver,
    HttpClient, HttpError, HttpRequest, HttpResponse, MpohodaDriver, OdooDriver, PosthogDriver,
    ReadRequest, StripeDriver, VendorId,
};

/// Replays a script of responses and records every dispatched request.
/// Once the script is exhausted it answers with an empty JSON object.
pub struct ScriptedHttpClient {
    script: Mutex<VecDeque<Result<HttpResponse, HttpError>>>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl ScriptedHttpClient {
    pub fn new(script: Vec<Result<HttpResponse, HttpError>>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn ok_json(bodies: &[&str]) -> Arc<Self> {
        Self::new(
            bodies
                .iter()
                .map(|body| Ok(HttpResponse::ok_json(*body)))
                .collect(),
        )
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn last_request(&self) -> HttpRequest {
        self.requests.lock().unwrap().last().cloned().unwrap()
    }
}

impl HttpClient for ScriptedHttpClient {
    fn execute<'a>(
        &'a self,
        request: HttpRequest,
    ) -> Pin<Box<dyn Future<Output = Result<HttpResponse, HttpError>> + Send + 'a>> {
        self.requests.lock().unwrap().push(request);
        let next = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(HttpResponse::ok_json("{}")));
        Box::pin(async move { next })
    }
}

/// Builds one driver per vendor against a scripted transport, for tests
/// that assert properties common to the whole family.
pub fn all_drivers(http: Arc<ScriptedHttpClient>) -> Vec<Box<dyn Driver>> {
    vec![
        Box::new(AmplitudeDriver::new(
            "amp-key",
            "https://amplitude.test",
            http.clone(),
        )),
        Box::new(ApifyDriver::new(
            "apify-token",
            "https://apify.test/v2",
            http.clone(),
        )),
        Box::new(FidooDriver::new(
            "fidoo-key",
            "https://fidoo.test/v2",
            http.clone(),
        )),
        Box::new(MpohodaDriver::with_api_key(
            "mp-key",
            "https://mpohoda.test/v1",
            http.clone(),
        )),
        Box::new(OdooDriver::new(
            "https://odoo.test",
            "db",
            "odoo-key",
            http.clone(),
        )),
        Box::new(PosthogDriver::new(
            "phx-key",
            "https://posthog.test/api",
            Some(String::from("1")),
            http.clone(),
        )),
        Box::new(StripeDriver::new("sk_test", "https://stripe.test", http)),
    ]
}
