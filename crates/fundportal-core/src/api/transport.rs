//! HTTP transport seam for the gateway.
//!
//! `ReqwestTransport` talks to the real backend; tests plug in scripted
//! transports that implement the same trait.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header, Client, Method};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use super::ApiError;

/// An outbound request as seen by the transport.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    /// Access token for the `Authorization: Bearer` header
    pub bearer: Option<String>,
    pub body: Option<Value>,
}

/// A response that arrived, whatever its status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Parse the body as JSON. An empty body reads as `null`.
    pub fn value(&self) -> Result<Value, ApiError> {
        if self.body.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&self.body)
            .map_err(|e| ApiError::InvalidResponse(format!("body is not JSON: {}", e)))
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T, ApiError> {
        serde_json::from_str(&self.body)
            .map_err(|e| ApiError::InvalidResponse(format!("unexpected body shape: {}", e)))
    }
}

/// Sends a request and returns whatever response arrives.
///
/// Only failures to get a response at all are errors; non-2xx statuses are
/// returned as `HttpResponse` for the gateway to interpret.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, ApiError>;
}

/// Transport backed by reqwest.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new(timeout: Duration) -> Result<Self, ApiError> {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::ACCEPT,
            header::HeaderValue::from_static("application/json"),
        );

        let client = Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()?;

        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, ApiError> {
        debug!(method = %request.method, url = %request.url, authenticated = request.bearer.is_some(), "Sending request");

        let mut builder = self.client.request(request.method, &request.url);
        if let Some(ref token) = request.bearer {
            builder = builder.bearer_auth(token);
        }
        if let Some(ref body) = request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;
        debug!(status, "Response received");

        Ok(HttpResponse { status, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_helpers() {
        let ok = HttpResponse::new(201, r#"{"id": "S1"}"#);
        assert!(ok.is_success());
        assert_eq!(ok.value().unwrap()["id"], "S1");

        let empty = HttpResponse::new(204, "");
        assert_eq!(empty.value().unwrap(), Value::Null);

        let bad = HttpResponse::new(200, "<html>");
        assert!(matches!(bad.value(), Err(ApiError::InvalidResponse(_))));
        assert!(!HttpResponse::new(302, "").is_success());
    }
}
