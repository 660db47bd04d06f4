use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub enum ResponseData {
    #[default]
    Empty,
    Json(serde_json::Value),
    Text(String),
}

impl ResponseData {
    /// Body as it is stored in the run log and the request's cached response.
    /// JSON is written compactly in the key order the server used; text is
    /// kept as received.
    pub fn to_body_string(&self) -> String {
        match self {
            ResponseData::Empty => String::new(),
            ResponseData::Json(value) => value.to_string(),
            ResponseData::Text(text) => text.clone(),
        }
    }
}

/// Outcome of a call that reached the server, whatever the status code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionResponse {
    pub status: u16,
    pub status_text: String,
    /// Flattened, in the order and case the server sent them.
    pub headers: Vec<(String, String)>,
    pub data: ResponseData,
    pub duration_ms: u64,
    pub size: u64,
}

impl ExecutionResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn is_http_error(&self) -> bool {
        self.status >= 400
    }
}

/// A call that never produced a response: DNS, connect, timeout, bad URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("{message}")]
pub struct ExecutionFailure {
    pub message: String,
    pub duration_ms: u64,
}

impl ExecutionFailure {
    pub fn new(message: impl Into<String>, duration_ms: u64) -> Self {
        Self {
            message: message.into(),
            duration_ms,
        }
    }
}

/// Size reported for a response: `Content-Length` when the server sent a
/// parseable one, else the byte length of the serialized body.
pub fn response_size(headers: &[(String, String)], data: &ResponseData) -> u64 {
    headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case("content-length"))
        .and_then(|(_, v)| v.trim().parse::<u64>().ok())
        .unwrap_or_else(|| data.to_body_string().len() as u64)
}
