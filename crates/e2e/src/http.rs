//! Direct HTTP channel to management endpoints
//!
//! Independent of the browser: no cookies are shared, and every call declares
//! the status it expects.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use bytes::Bytes;
use futures::StreamExt;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Method, Response};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use crate::error::{E2eError, E2eResult};

/// HTTP verbs used against management resources
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    #[default]
    Get,
    Post,
    Delete,
}

impl HttpMethod {
    fn as_reqwest(self) -> Method {
        match self {
            HttpMethod::Get => Method::GET,
            HttpMethod::Post => Method::POST,
            HttpMethod::Delete => Method::DELETE,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Delete => "DELETE",
        }
    }
}

/// A single management call
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: BTreeMap<String, String>,
    pub expected_status: u16,
    pub body: Option<String>,
}

impl HttpRequest {
    pub fn new(method: HttpMethod, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: BTreeMap::new(),
            expected_status: 200,
            body: None,
        }
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn expect(mut self, status: u16) -> Self {
        self.expected_status = status;
        self
    }

    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }
}

/// Buffered response of a successful call
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Bytes,
}

impl HttpResponse {
    pub fn json(&self) -> E2eResult<Value> {
        Ok(serde_json::from_slice(&self.body)?)
    }

    /// JSON body if there is one, `None` for empty or non-JSON bodies
    pub fn json_opt(&self) -> Option<Value> {
        if self.body.is_empty() {
            return None;
        }
        serde_json::from_slice(&self.body).ok()
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Cookie-less client for management/actuator endpoints
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
}

impl HttpClient {
    pub fn new(timeout: Duration, accept_invalid_certs: bool) -> E2eResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .danger_accept_invalid_certs(accept_invalid_certs)
            .build()?;
        Ok(Self { client })
    }

    async fn send(&self, request: &HttpRequest) -> E2eResult<Response> {
        let mut headers = HeaderMap::new();
        for (name, value) in &request.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| E2eError::SpecParse(format!("header name '{}': {}", name, e)))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| E2eError::SpecParse(format!("header value for '{}': {}", name, e)))?;
            headers.insert(name, value);
        }

        let mut builder = self
            .client
            .request(request.method.as_reqwest(), &request.url)
            .headers(headers);
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        info!("{} {}", request.method.as_str(), request.url);
        let response = builder.send().await?;
        let status = response.status().as_u16();
        debug!("{} {} -> {}", request.method.as_str(), request.url, status);

        if status != request.expected_status {
            return Err(E2eError::UnexpectedStatus {
                method: request.method.as_str().to_string(),
                url: request.url.clone(),
                got: status,
                want: request.expected_status,
            });
        }
        Ok(response)
    }

    /// Issue the request and buffer the body.
    pub async fn request(&self, request: &HttpRequest) -> E2eResult<HttpResponse> {
        let response = self.send(request).await?;
        let status = response.status().as_u16();
        let body = response.bytes().await?;
        Ok(HttpResponse { status, body })
    }

    /// Issue the request and stream the body to `dest` chunk by chunk.
    /// Returns the number of bytes written.
    pub async fn download(&self, request: &HttpRequest, dest: &Path) -> E2eResult<u64> {
        let response = self.send(request).await?;

        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut file = tokio::fs::File::create(dest).await?;
        let mut written = 0u64;
        let mut stream = response.bytes_stream();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;

        info!("Streamed {} bytes to {}", written, dest.display());
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_builder_defaults() {
        let req = HttpRequest::new(HttpMethod::Delete, "https://localhost:8443/cas/actuator/attributeConsent/casuser");
        assert_eq!(req.expected_status, 200);
        assert!(req.body.is_none());

        let req = HttpRequest::new(HttpMethod::Post, "https://localhost:8443/import")
            .header("Content-Type", "application/json")
            .expect(201)
            .body("{}");
        assert_eq!(req.expected_status, 201);
        assert_eq!(req.headers.get("Content-Type").map(String::as_str), Some("application/json"));
    }

    #[test]
    fn test_method_parses_uppercase() {
        let m: HttpMethod = serde_yaml::from_str("DELETE").unwrap();
        assert_eq!(m, HttpMethod::Delete);
    }

    #[test]
    fn test_json_opt_tolerates_empty_body() {
        let resp = HttpResponse {
            status: 204,
            body: Bytes::new(),
        };
        assert!(resp.json_opt().is_none());
    }
}
