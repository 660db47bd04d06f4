use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const UNTITLED: &str = "Untitled";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    #[default]
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unsupported HTTP method '{0}'")]
pub struct UnknownMethod(pub String);

impl FromStr for HttpMethod {
    type Err = UnknownMethod;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "GET" => Ok(HttpMethod::Get),
            "POST" => Ok(HttpMethod::Post),
            "PUT" => Ok(HttpMethod::Put),
            "PATCH" => Ok(HttpMethod::Patch),
            "DELETE" => Ok(HttpMethod::Delete),
            _ => Err(UnknownMethod(s.to_string())),
        }
    }
}

/// A header or query parameter as it is persisted and sent.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KeyValue {
    pub key: String,
    pub value: String,
}

impl KeyValue {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Ordered pairs; order is significant and preserved end to end.
pub type OrderedPairs = Vec<KeyValue>;

/// Durable request entity. Only exists inside a collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestDefinition {
    pub id: String,
    pub collection_id: String,
    pub name: String,
    pub method: HttpMethod,
    pub url: String,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub cached_response: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    // pair lists last: they serialize as TOML arrays of tables
    #[serde(default)]
    pub headers: OrderedPairs,
    #[serde(default)]
    pub parameters: OrderedPairs,
}

impl RequestDefinition {
    pub fn from_draft(collection_id: impl Into<String>, draft: RequestDraft) -> Self {
        let now = Utc::now();
        let name = if draft.name.trim().is_empty() {
            UNTITLED.to_string()
        } else {
            draft.name
        };
        Self {
            id: Uuid::new_v4().to_string(),
            collection_id: collection_id.into(),
            name,
            method: draft.method,
            url: draft.url,
            body: draft.body,
            cached_response: None,
            created_at: now,
            updated_at: now,
            headers: draft.headers,
            parameters: draft.parameters,
        }
    }

    /// Merge a partial update. Fields left `None` keep their value.
    pub fn apply(&mut self, patch: RequestPatch) {
        if let Some(name) = patch.name {
            self.name = name;
        }
        if let Some(method) = patch.method {
            self.method = method;
        }
        if let Some(url) = patch.url {
            self.url = url;
        }
        if let Some(headers) = patch.headers {
            self.headers = headers;
        }
        if let Some(parameters) = patch.parameters {
            self.parameters = parameters;
        }
        if let Some(body) = patch.body {
            self.body = body;
        }
        self.updated_at = Utc::now();
    }
}

/// Input for creating a request inside a collection.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RequestDraft {
    pub name: String,
    pub method: HttpMethod,
    pub url: String,
    pub headers: OrderedPairs,
    pub parameters: OrderedPairs,
    pub body: String,
}

impl RequestDraft {
    pub fn new(name: impl Into<String>, method: HttpMethod, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            method,
            url: url.into(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct RequestPatch {
    pub name: Option<String>,
    pub method: Option<HttpMethod>,
    pub url: Option<String>,
    pub headers: Option<OrderedPairs>,
    pub parameters: Option<OrderedPairs>,
    pub body: Option<String>,
}

impl From<RequestDraft> for RequestPatch {
    fn from(draft: RequestDraft) -> Self {
        Self {
            name: Some(draft.name),
            method: Some(draft.method),
            url: Some(draft.url),
            headers: Some(draft.headers),
            parameters: Some(draft.parameters),
            body: Some(draft.body),
        }
    }
}
