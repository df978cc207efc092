//! HTTP transport for the SQL API
//!
//! `SnowflakeSource` speaks to the API through `HttpTransport`, so the
//! statement/poll/partition flow can be driven by a scripted transport in
//! tests while production uses `reqwest`'s blocking client.

use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue, USER_AGENT};
use snowcopy_core::{Result, SnowcopyError};

use crate::SnowflakeConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    /// Absolute URL
    pub url: String,
    pub body: Option<serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: String,
}

pub trait HttpTransport: Send + Sync {
    fn send(&self, request: &ApiRequest) -> Result<ApiResponse>;
}

/// Blocking `reqwest` client carrying the auth headers for every request
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new(config: &SnowflakeConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        let bearer = HeaderValue::from_str(&format!("Bearer {}", config.token.trim()))
            .map_err(|e| SnowcopyError::Configuration(format!("Invalid token: {}", e)))?;
        headers.insert(AUTHORIZATION, bearer);
        headers.insert(
            "X-Snowflake-Authorization-Token-Type",
            HeaderValue::from_static(config.token_type.header_value()),
        );
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            USER_AGENT,
            HeaderValue::from_static(concat!("snowcopy/", env!("CARGO_PKG_VERSION"))),
        );

        let client = Client::builder()
            .default_headers(headers)
            // leave headroom over the server-side statement timeout
            .timeout(config.timeout() + Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(10))
            .tcp_keepalive(Duration::from_secs(60))
            .gzip(true)
            .build()
            .map_err(|e| {
                SnowcopyError::Connection(format!("Failed to create HTTP client: {}", e))
            })?;

        Ok(Self { client })
    }
}

impl HttpTransport for ReqwestTransport {
    fn send(&self, request: &ApiRequest) -> Result<ApiResponse> {
        let builder = match request.method {
            Method::Get => self.client.get(&request.url),
            Method::Post => self.client.post(&request.url),
        };
        let builder = match &request.body {
            Some(body) => builder.json(body),
            None => builder,
        };

        let response = builder.send().map_err(|e| {
            if e.is_timeout() {
                SnowcopyError::Timeout(format!("Request to {} timed out", request.url))
            } else {
                SnowcopyError::Connection(format!("Request to {} failed: {}", request.url, e))
            }
        })?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .map_err(|e| SnowcopyError::Remote(format!("Failed to read response body: {}", e)))?;
        Ok(ApiResponse { status, body })
    }
}
