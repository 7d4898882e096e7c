use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, RequestBuilder};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

use crate::config::LoadConfig;
use crate::metrics::Metrics;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("Invalid header name '{0}'")]
    HeaderName(String),
    #[error("Invalid value for header '{0}'")]
    HeaderValue(String),
    #[error("Failed to create HTTP client: {0}")]
    Build(#[from] reqwest::Error),
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Timings {
    /// Milliseconds from sending the request until the body was read.
    pub duration: f64,
}

#[derive(Debug, Clone, Default)]
pub struct Response {
    /// HTTP status, or 0 when no response was received.
    pub status: u16,
    pub timings: Timings,
    pub body: String,
    pub error: Option<String>,
}

impl Response {
    pub fn json(&self) -> Result<serde_json::Value, serde_json::Error> {
        serde_json::from_str(&self.body)
    }

    /// Statuses outside 2xx/3xx and transport failures count towards `http_req_failed`.
    pub fn is_failed(&self) -> bool {
        !(200..400).contains(&self.status)
    }
}

pub fn header_map(headers: &BTreeMap<String, String>) -> Result<HeaderMap, ClientError> {
    let mut map = HeaderMap::with_capacity(headers.len());
    for (name, value) in headers {
        let header_name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|_| ClientError::HeaderName(name.clone()))?;
        let header_value =
            HeaderValue::from_str(value).map_err(|_| ClientError::HeaderValue(name.clone()))?;
        map.insert(header_name, header_value);
    }
    Ok(map)
}

/// Timed HTTP client that records every request into the run metrics.
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
    metrics: Arc<Metrics>,
}

impl HttpClient {
    pub fn new(config: &LoadConfig, metrics: Arc<Metrics>) -> Result<Self, ClientError> {
        let client = Client::builder()
            .timeout(config.http_timeout())
            .user_agent(concat!("api-loadtest/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self { client, metrics })
    }

    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.metrics
    }

    pub async fn get(&self, url: &str, headers: HeaderMap) -> Response {
        self.send(self.client.get(url).headers(headers)).await
    }

    pub async fn post_json(&self, url: &str, body: String, headers: HeaderMap) -> Response {
        self.send(self.client.post(url).headers(headers).body(body)).await
    }

    async fn send(&self, request: RequestBuilder) -> Response {
        let start = Instant::now();
        let result = match request.send().await {
            Ok(resp) => {
                let status = resp.status().as_u16();
                resp.text().await.map(|body| (status, body))
            }
            Err(e) => Err(e),
        };
        let duration = start.elapsed().as_secs_f64() * 1000.0;

        let response = match result {
            Ok((status, body)) => Response {
                status,
                timings: Timings { duration },
                body,
                error: None,
            },
            Err(e) => {
                let msg = if e.is_connect() {
                    "Connection refused or host unreachable"
                } else if e.is_timeout() {
                    "Timeout"
                } else if e.is_body() || e.is_decode() {
                    "Failed to read response body"
                } else {
                    "Unknown network error"
                };
                debug!("Request failed after {:.0}ms: {}: {}", duration, msg, e);
                Response {
                    status: 0,
                    timings: Timings { duration },
                    body: String::new(),
                    error: Some(format!("{msg}: {e}")),
                }
            }
        };

        self.metrics
            .record_request(response.timings.duration, response.is_failed())
            .await;

        response
    }
}
