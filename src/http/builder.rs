use reqwest::header::{CONTENT_TYPE, HeaderName, HeaderValue};
use reqwest::{Client, Method, RequestBuilder};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::AppError;
use crate::state::request_state::{HttpMethod, KeyValue, OrderedPairs, RequestDefinition};

/// Everything needed to issue one call. Headers and parameters are already
/// the effective pairs; nothing downstream filters them again.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ExecutionConfig {
    pub method: HttpMethod,
    pub url: String,
    #[serde(default)]
    pub headers: OrderedPairs,
    #[serde(default)]
    pub params: OrderedPairs,
    #[serde(default)]
    pub body: Option<String>,
}

impl ExecutionConfig {
    pub fn new(method: HttpMethod, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            ..Default::default()
        }
    }
}

impl From<&RequestDefinition> for ExecutionConfig {
    fn from(request: &RequestDefinition) -> Self {
        Self {
            method: request.method,
            url: request.url.clone(),
            headers: request.headers.clone(),
            params: request.parameters.clone(),
            body: (!request.body.is_empty()).then(|| request.body.clone()),
        }
    }
}

fn to_reqwest_method(method: HttpMethod) -> Method {
    match method {
        HttpMethod::Get => Method::GET,
        HttpMethod::Post => Method::POST,
        HttpMethod::Put => Method::PUT,
        HttpMethod::Patch => Method::PATCH,
        HttpMethod::Delete => Method::DELETE,
    }
}

pub fn parse_url(raw: &str) -> Result<Url, AppError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(AppError::InvalidUrl {
            url: raw.to_string(),
            reason: "URL is empty".into(),
        });
    }
    let url = Url::parse(trimmed).map_err(|e| AppError::InvalidUrl {
        url: raw.to_string(),
        reason: e.to_string(),
    })?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(AppError::InvalidUrl {
            url: raw.to_string(),
            reason: format!("unsupported scheme '{other}'"),
        }),
    }
}

fn header_pair(header: &KeyValue) -> Result<(HeaderName, HeaderValue), AppError> {
    let name = HeaderName::from_bytes(header.key.trim().as_bytes())
        .map_err(|e| AppError::Validation(format!("header name '{}': {e}", header.key)))?;
    let value = HeaderValue::from_str(&header.value)
        .map_err(|e| AppError::Validation(format!("header '{}' value: {e}", header.key)))?;
    Ok((name, value))
}

/// Checks that `build_request` would accept the config, without a client.
pub fn validate(config: &ExecutionConfig) -> Result<(), AppError> {
    parse_url(&config.url)?;
    for header in &config.headers {
        header_pair(header)?;
    }
    Ok(())
}

pub fn build_request(client: &Client, config: &ExecutionConfig) -> Result<RequestBuilder, AppError> {
    let mut url = parse_url(&config.url)?;
    if !config.params.is_empty() {
        let mut query = url.query_pairs_mut();
        for param in &config.params {
            query.append_pair(&param.key, &param.value);
        }
    }

    let mut builder = client.request(to_reqwest_method(config.method), url);

    let mut has_content_type = false;
    for header in &config.headers {
        let (name, value) = header_pair(header)?;
        has_content_type |= name == CONTENT_TYPE;
        builder = builder.header(name, value);
    }

    if let Some(body) = config.body.as_deref().filter(|b| !b.is_empty()) {
        if !has_content_type && serde_json::from_str::<serde_json::Value>(body).is_ok() {
            builder = builder.header(CONTENT_TYPE, mime::APPLICATION_JSON.as_ref());
        }
        builder = builder.body(body.to_string());
    }

    Ok(builder)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::request_state::RequestDraft;

    #[test]
    fn test_parse_url_rejects_empty_and_relative() {
        assert!(parse_url("").is_err());
        assert!(parse_url("example.test/path").is_err());
        assert!(parse_url("ftp://example.test").is_err());
        assert!(parse_url(" https://example.test/ok ").is_ok());
    }

    #[test]
    fn test_query_params_appended_in_order() {
        let client = Client::new();
        let mut config = ExecutionConfig::new(HttpMethod::Get, "https://example.test/search?q=1");
        config.params = vec![KeyValue::new("b", "2"), KeyValue::new("a", "x y")];
        let request = build_request(&client, &config).unwrap().build().unwrap();
        assert_eq!(request.url().as_str(), "https://example.test/search?q=1&b=2&a=x+y");
    }

    #[test]
    fn test_json_body_gets_content_type() {
        let client = Client::new();
        let mut config = ExecutionConfig::new(HttpMethod::Post, "https://example.test");
        config.body = Some(r#"{"a":1}"#.into());
        let request = build_request(&client, &config).unwrap().build().unwrap();
        assert_eq!(request.headers()[CONTENT_TYPE], "application/json");

        config.headers = vec![KeyValue::new("content-type", "text/plain")];
        let request = build_request(&client, &config).unwrap().build().unwrap();
        assert_eq!(request.headers()[CONTENT_TYPE], "text/plain");

        config.headers.clear();
        config.body = Some("plain words".into());
        let request = build_request(&client, &config).unwrap().build().unwrap();
        assert!(request.headers().get(CONTENT_TYPE).is_none());
    }

    #[test]
    fn test_bad_header_name_is_validation_error() {
        let client = Client::new();
        let mut config = ExecutionConfig::new(HttpMethod::Get, "https://example.test");
        config.headers = vec![KeyValue::new("bad header", "v")];
        assert!(matches!(build_request(&client, &config), Err(AppError::Validation(_))));
        assert!(matches!(validate(&config), Err(AppError::Validation(_))));
    }

    #[test]
    fn test_config_from_definition_drops_empty_body() {
        let def = RequestDefinition::from_draft("c", RequestDraft::new("n", HttpMethod::Delete, "https://example.test/1"));
        let config = ExecutionConfig::from(&def);
        assert_eq!(config.method, HttpMethod::Delete);
        assert_eq!(config.body, None);
    }
}
