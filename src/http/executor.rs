use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::CONTENT_TYPE;

use super::builder::{ExecutionConfig, build_request};
use crate::state::response_state::{ExecutionFailure, ExecutionResponse, ResponseData, response_size};

/// Issues one HTTP call. Every status code is an `Ok`; `Err` is reserved for
/// calls that never got a response.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn execute(&self, config: &ExecutionConfig) -> Result<ExecutionResponse, ExecutionFailure>;
}

/// Whole milliseconds, rounded, from a monotonic measurement.
pub fn round_ms(elapsed: Duration) -> u64 {
    (elapsed.as_secs_f64() * 1000.0).round() as u64
}

#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn execute(&self, config: &ExecutionConfig) -> Result<ExecutionResponse, ExecutionFailure> {
        let start = Instant::now();
        let fail = |message: String| ExecutionFailure::new(message, round_ms(start.elapsed()));

        let request = build_request(&self.client, config)
            .and_then(|builder| builder.build().map_err(Into::into))
            .map_err(|e| fail(e.to_string()))?;
        let response = self
            .client
            .execute(request)
            .await
            .map_err(|e| fail(describe(&e)))?;

        let status = response.status();
        let status_text = status.canonical_reason().unwrap_or("Unknown").to_string();

        let headers: Vec<(String, String)> = response
            .headers()
            .iter()
            .map(|(k, v)| (k.to_string(), String::from_utf8_lossy(v.as_bytes()).into_owned()))
            .collect();

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let bytes = response.bytes().await.map_err(|e| fail(describe(&e)))?;
        let duration_ms = round_ms(start.elapsed());

        let data = parse_body(content_type.as_deref(), &bytes);
        let size = response_size(&headers, &data);

        Ok(ExecutionResponse {
            status: status.as_u16(),
            status_text,
            headers,
            data,
            duration_ms,
            size,
        })
    }
}

fn describe(err: &reqwest::Error) -> String {
    if err.is_timeout() {
        format!("request timed out: {err}")
    } else if err.is_connect() {
        format!("connection failed: {err}")
    } else if err.is_builder() {
        format!("invalid request: {err}")
    } else {
        err.to_string()
    }
}

fn is_json(content_type: &str) -> bool {
    content_type
        .parse::<mime::Mime>()
        .map(|m| m.subtype() == mime::JSON || m.suffix() == Some(mime::JSON))
        .unwrap_or(false)
}

/// JSON when the server says so (or says nothing and it parses), text otherwise.
pub fn parse_body(content_type: Option<&str>, bytes: &[u8]) -> ResponseData {
    if bytes.is_empty() {
        return ResponseData::Empty;
    }
    let try_json = match content_type {
        Some(ct) => is_json(ct),
        None => true,
    };
    if try_json {
        if let Ok(value) = serde_json::from_slice::<serde_json::Value>(bytes) {
            return ResponseData::Json(value);
        }
    }
    ResponseData::Text(String::from_utf8_lossy(bytes).into_owned())
}
