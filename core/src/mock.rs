//! In-memory transport for tests.
//!
//! `MockTransport` answers requests from scripted replies keyed by method and
//! rendered URL (query string excluded) and records every request it sees.
//! Later scripts for the same route replace earlier ones; unscripted routes
//! answer 404.

use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use serde_json::Value;

use crate::error::ApiError;
use crate::http::{HttpMethod, HttpRequest, HttpResponse};
use crate::transport::HttpTransport;

#[derive(Debug, Clone)]
enum Reply {
    Respond(HttpResponse),
    Fail(ApiError),
}

#[derive(Debug, Default)]
struct Script {
    routes: Vec<(HttpMethod, String, Reply)>,
    requests: Vec<HttpRequest>,
}

/// Scripted transport. Clones share the same script and request log.
#[derive(Debug, Clone, Default)]
pub struct MockTransport {
    script: Arc<Mutex<Script>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer `method url` with `status` and `body` as JSON. A null body is
    /// sent as an empty body.
    pub fn respond(&self, method: HttpMethod, url: &str, status: u16, body: Value) -> &Self {
        let body = if body.is_null() { String::new() } else { body.to_string() };
        let response = HttpResponse {
            status,
            headers: vec![("content-type".to_string(), "application/json".to_string())],
            body,
        };
        self.script().routes.push((method, url.to_string(), Reply::Respond(response)));
        self
    }

    /// Fail `method url` at the transport level.
    pub fn fail(&self, method: HttpMethod, url: &str, error: ApiError) -> &Self {
        self.script().routes.push((method, url.to_string(), Reply::Fail(error)));
        self
    }

    /// Every request sent so far, oldest first.
    pub fn requests(&self) -> Vec<HttpRequest> {
        self.script().requests.clone()
    }

    fn script(&self) -> MutexGuard<'_, Script> {
        // A panicking test thread must not hide the log from the others.
        self.script.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl HttpTransport for MockTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, ApiError> {
        let mut script = self.script();
        let reply = script
            .routes
            .iter()
            .rev()
            .find(|(method, url, _)| *method == request.method && *url == request.url)
            .map(|(_, _, reply)| reply.clone());
        script.requests.push(request);

        match reply {
            Some(Reply::Respond(response)) => Ok(response),
            Some(Reply::Fail(error)) => Err(error),
            None => Ok(HttpResponse {
                status: 404,
                headers: Vec::new(),
                body: String::new(),
            }),
        }
    }
}
