//! The transport seam and its blocking `ureq` implementation.
//!
//! # Design
//! `HttpTransport` is the only place network I/O happens. It receives a fully
//! shaped `HttpRequest` and returns the raw `HttpResponse`; status codes are
//! data, not errors, so the resource layer decides what counts as failure.
//! Only a round-trip that could not complete is an `Err`.

use async_trait::async_trait;
use ureq::typestate::{WithBody, WithoutBody};
use ureq::{Agent, RequestBuilder};

use crate::error::ApiError;
use crate::http::{HttpMethod, HttpRequest, HttpResponse};

/// Executes HTTP round-trips for resource calls.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, ApiError>;
}

/// Transport backed by a `ureq` agent, run on tokio's blocking pool.
///
/// Relative request URLs (starting with `/`) are resolved against
/// `base_url`; absolute ones are used as-is.
#[derive(Clone)]
pub struct UreqTransport {
    agent: Agent,
    base_url: String,
}

impl std::fmt::Debug for UreqTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UreqTransport").field("base_url", &self.base_url).finish()
    }
}

impl UreqTransport {
    pub fn new(base_url: &str) -> Self {
        let agent = Agent::config_builder()
            .http_status_as_error(false)
            .build()
            .new_agent();
        Self {
            agent,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn resolve(&self, url: &str) -> String {
        if url.starts_with('/') {
            format!("{}{url}", self.base_url)
        } else {
            url.to_string()
        }
    }
}

#[async_trait]
impl HttpTransport for UreqTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, ApiError> {
        let agent = self.agent.clone();
        let url = self.resolve(&request.full_url());
        tracing::debug!(method = %request.method, %url, "sending request");
        tokio::task::spawn_blocking(move || execute(&agent, &url, &request))
            .await
            .map_err(|e| ApiError::Transport(e.to_string()))?
    }
}

fn execute(agent: &Agent, url: &str, request: &HttpRequest) -> Result<HttpResponse, ApiError> {
    let body = match &request.data {
        Some(data) if request.method.has_body() => {
            let json = serde_json::to_string(data)
                .map_err(|e| ApiError::Transport(format!("serializing body: {e}")))?;
            Some(json)
        }
        _ => None,
    };
    let headers = &request.headers;

    let result = match request.method {
        HttpMethod::Get => without_body(agent.get(url), headers).call(),
        HttpMethod::Delete => without_body(agent.delete(url), headers).call(),
        HttpMethod::Head => without_body(agent.head(url), headers).call(),
        HttpMethod::Options => without_body(agent.options(url), headers).call(),
        HttpMethod::Post => send_with_body(agent.post(url), headers, body),
        HttpMethod::Put => send_with_body(agent.put(url), headers, body),
        HttpMethod::Patch => send_with_body(agent.patch(url), headers, body),
    };
    let mut response = result.map_err(|e| ApiError::Transport(e.to_string()))?;

    let status = response.status().as_u16();
    let headers = response
        .headers()
        .iter()
        .filter_map(|(name, value)| {
            let value = value.to_str().ok()?;
            Some((name.as_str().to_string(), value.to_string()))
        })
        .collect();
    let body = response
        .body_mut()
        .read_to_string()
        .map_err(|e| ApiError::Transport(e.to_string()))?;

    Ok(HttpResponse {
        status,
        headers,
        body,
    })
}

fn without_body(
    mut builder: RequestBuilder<WithoutBody>,
    headers: &[(String, String)],
) -> RequestBuilder<WithoutBody> {
    for (name, value) in headers {
        builder = builder.header(name.as_str(), value.as_str());
    }
    builder
}

fn send_with_body(
    mut builder: RequestBuilder<WithBody>,
    headers: &[(String, String)],
    body: Option<String>,
) -> Result<ureq::http::Response<ureq::Body>, ureq::Error> {
    for (name, value) in headers {
        builder = builder.header(name.as_str(), value.as_str());
    }
    match body {
        Some(body) => builder.content_type("application/json").send(body.as_bytes()),
        None => builder.send_empty(),
    }
}
