//! HTTP transport seam.
//!
//! The platform client speaks to the network through [`HttpTransport`] so
//! that cookie handling and redirect following stay under its control: the
//! reqwest implementation never follows redirects and never stores cookies
//! on its own.

use async_trait::async_trait;
use autoseat_core::{AutoseatError, Result};
use reqwest::Client;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::redirect::Policy;
use serde_json::Value;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
}

#[derive(Debug, Clone, PartialEq)]
pub enum HttpBody {
    Empty,
    Form(Vec<(String, String)>),
    Json(Value),
}

/// A fully materialized request, headers included.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: HttpBody,
}

impl HttpRequest {
    pub fn new(method: HttpMethod, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: Vec::new(),
            body: HttpBody::Empty,
        }
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn form(mut self, fields: Vec<(String, String)>) -> Self {
        self.body = HttpBody::Form(fields);
        self
    }

    pub fn json(mut self, body: Value) -> Self {
        self.body = HttpBody::Json(body);
        self
    }

    /// Header value lookup (case-insensitive).
    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// Raw response as seen by the client, before any interpretation.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl HttpResponse {
    pub fn is_redirect(&self) -> bool {
        (300..400).contains(&self.status)
    }

    pub fn is_error(&self) -> bool {
        self.status >= 400
    }

    pub fn location(&self) -> Option<&str> {
        self.headers
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case("location"))
            .map(|(_, value)| value.as_str())
    }

    /// All `Set-Cookie` header values, in arrival order.
    pub fn set_cookies(&self) -> impl Iterator<Item = &str> {
        self.headers
            .iter()
            .filter(|(name, _)| name.eq_ignore_ascii_case("set-cookie"))
            .map(|(_, value)| value.as_str())
    }

    /// Parses the body as JSON; an empty body reads as `null`.
    pub fn json(&self) -> Result<Value> {
        if self.body.trim().is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_str(&self.body)?)
    }
}

/// Sends one request and returns the raw response.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse>;
}

/// Production transport backed by reqwest.
#[derive(Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    /// Creates a transport with redirects disabled and the given per-request timeout.
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .redirect(Policy::none())
            .timeout(timeout)
            .user_agent(concat!("autoseat/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| AutoseatError::transport(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        let method = match request.method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Put => reqwest::Method::PUT,
        };

        let mut headers = HeaderMap::new();
        for (name, value) in &request.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| AutoseatError::transport(format!("Invalid header name: {}", e)))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| AutoseatError::transport(format!("Invalid header value: {}", e)))?;
            headers.append(name, value);
        }

        let mut builder = self.client.request(method, &request.url).headers(headers);
        builder = match request.body {
            HttpBody::Empty => builder,
            HttpBody::Form(fields) => builder.form(&fields),
            HttpBody::Json(body) => builder.json(&body),
        };

        let response = builder
            .send()
            .await
            .map_err(|e| AutoseatError::transport(format!("{} failed: {}", request.url, e)))?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();
        let body = response
            .text()
            .await
            .map_err(|e| AutoseatError::transport(format!("Failed to read body: {}", e)))?;

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_helpers() {
        let response = HttpResponse {
            status: 302,
            headers: vec![
                ("Location".into(), "/home".into()),
                ("set-cookie".into(), "a=1; Path=/".into()),
                ("Set-Cookie".into(), "b=2".into()),
            ],
            body: String::new(),
        };

        assert!(response.is_redirect());
        assert!(!response.is_error());
        assert_eq!(response.location(), Some("/home"));
        assert_eq!(response.set_cookies().collect::<Vec<_>>(), vec!["a=1; Path=/", "b=2"]);
        assert_eq!(response.json().unwrap(), Value::Null);
    }

    #[test]
    fn test_request_header_lookup() {
        let request = HttpRequest::new(HttpMethod::Get, "https://x").header("Cookie", "a=1");
        assert_eq!(request.header_value("cookie"), Some("a=1"));
        assert_eq!(request.header_value("accept"), None);
    }
}
