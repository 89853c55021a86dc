//! HTTP request and response types for the host-does-IO seam.
//!
//! # Design
//! The resource layer only shapes an `HttpRequest`; an `HttpTransport`
//! performs the round-trip and hands back an `HttpResponse` as plain data.
//! `parse_response` then turns the raw response into a `Response` carrying
//! decoded JSON, or into the `ApiError` the caller's error callback sees.
//!
//! Request bodies stay as `serde_json::Value` until the transport
//! serializes them. Parameters that are not part of the URL template ride
//! along in `params` and are encoded into the query string by `full_url`.

use std::fmt;
use std::str::FromStr;

use serde_json::Value;

use crate::encoding::{encode_uri_query, SpaceEncoding};
use crate::error::ApiError;
use crate::template::ParamValues;

/// HTTP method for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Head,
    Options,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Head => "HEAD",
            HttpMethod::Options => "OPTIONS",
        }
    }

    /// Whether requests with this method carry the call's data as a body.
    pub fn has_body(&self) -> bool {
        matches!(self, HttpMethod::Post | HttpMethod::Put | HttpMethod::Patch)
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a method name is not one of the supported verbs.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unsupported HTTP method `{0}`")]
pub struct UnknownMethod(pub String);

impl FromStr for HttpMethod {
    type Err = UnknownMethod;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(HttpMethod::Get),
            "POST" => Ok(HttpMethod::Post),
            "PUT" => Ok(HttpMethod::Put),
            "PATCH" => Ok(HttpMethod::Patch),
            "DELETE" => Ok(HttpMethod::Delete),
            "HEAD" => Ok(HttpMethod::Head),
            "OPTIONS" => Ok(HttpMethod::Options),
            _ => Err(UnknownMethod(s.to_string())),
        }
    }
}

/// An HTTP request described as plain data.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub method: HttpMethod,
    /// Rendered URL without the query string.
    pub url: String,
    /// Parameters that were not consumed by the URL template.
    pub params: ParamValues,
    pub headers: Vec<(String, String)>,
    pub data: Option<Value>,
}

impl HttpRequest {
    /// The URL with `params` appended as a query string.
    ///
    /// Null values are skipped, arrays repeat the key once per element and
    /// objects are sent as JSON text.
    pub fn full_url(&self) -> String {
        let pairs: Vec<String> = self
            .params
            .iter()
            .flat_map(|(key, value)| {
                query_values(value).into_iter().map(move |v| {
                    format!(
                        "{}={}",
                        encode_uri_query(key, SpaceEncoding::Plus),
                        encode_uri_query(&v, SpaceEncoding::Plus)
                    )
                })
            })
            .collect();

        if pairs.is_empty() {
            return self.url.clone();
        }
        let separator = if self.url.contains('?') { '&' } else { '?' };
        format!("{}{separator}{}", self.url, pairs.join("&"))
    }
}

fn query_values(value: &Value) -> Vec<String> {
    match value {
        Value::Null => Vec::new(),
        Value::Array(items) => items.iter().filter(|v| !v.is_null()).map(query_text).collect(),
        other => vec![query_text(other)],
    }
}

fn query_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// An HTTP response as the transport received it.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

/// A successful response with its body decoded.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    /// Decoded body; `Value::Null` when the body was empty.
    pub data: Value,
}

impl Response {
    /// First header with this name, compared case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// Check the status and decode the body of a raw response.
pub fn parse_response(response: HttpResponse) -> Result<Response, ApiError> {
    check_status(&response)?;
    let data = if response.body.trim().is_empty() {
        Value::Null
    } else {
        serde_json::from_str(&response.body).map_err(|e| ApiError::Deserialization(e.to_string()))?
    };
    Ok(Response {
        status: response.status,
        headers: response.headers,
        data,
    })
}

/// Map non-success status codes to the appropriate `ApiError` variant.
fn check_status(response: &HttpResponse) -> Result<(), ApiError> {
    if (200..300).contains(&response.status) {
        return Ok(());
    }
    if response.status == 404 {
        return Err(ApiError::NotFound);
    }
    Err(ApiError::HttpError {
        status: response.status,
        body: response.body.clone(),
    })
}
