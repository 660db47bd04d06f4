use uuid::Uuid;

use super::request_state::{HttpMethod, OrderedPairs, RequestDefinition, RequestDraft, UNTITLED};
use crate::runner::RunOutcome;

/// Inline status indicator for the last run of a tab.
#[derive(Debug, Clone, PartialEq)]
pub enum TabResponse {
    Received {
        status: u16,
        status_text: String,
        duration_ms: u64,
        size: u64,
        body: String,
    },
    Failed {
        error: String,
        duration_ms: u64,
    },
}

impl TabResponse {
    pub fn from_outcome(outcome: &RunOutcome) -> Self {
        match outcome {
            RunOutcome::Succeeded { response, .. } => TabResponse::Received {
                status: response.status,
                status_text: response.status_text.clone(),
                duration_ms: response.duration_ms,
                size: response.size,
                body: response.data.to_body_string(),
            },
            RunOutcome::Failed { error, run_record } => TabResponse::Failed {
                error: error.clone(),
                duration_ms: run_record.as_ref().map_or(0, |r| r.duration_ms),
            },
        }
    }
}

/// One open editor. `request_id` is `None` while the tab is a draft.
#[derive(Debug, Clone, PartialEq)]
pub struct Tab {
    pub id: String,
    pub title: String,
    pub method: HttpMethod,
    pub url: String,
    pub body: String,
    pub headers: OrderedPairs,
    pub parameters: OrderedPairs,
    pub request_id: Option<String>,
    pub collection_id: Option<String>,
    pub unsaved_changes: bool,
    pub last_response: Option<TabResponse>,
}

impl Tab {
    pub fn draft() -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            title: UNTITLED.to_string(),
            method: HttpMethod::Get,
            url: String::new(),
            body: String::new(),
            headers: Vec::new(),
            parameters: Vec::new(),
            request_id: None,
            collection_id: None,
            unsaved_changes: true,
            last_response: None,
        }
    }

    /// A clean tab attached to `request`, sharing its id.
    pub fn attached(request: &RequestDefinition) -> Self {
        let mut tab = Self::draft();
        tab.mirror(request);
        tab
    }

    pub fn is_draft(&self) -> bool {
        self.request_id.is_none()
    }

    pub(crate) fn mirror(&mut self, request: &RequestDefinition) {
        self.id = request.id.clone();
        self.title = request.name.clone();
        self.method = request.method;
        self.url = request.url.clone();
        self.body = request.body.clone();
        self.headers = request.headers.clone();
        self.parameters = request.parameters.clone();
        self.request_id = Some(request.id.clone());
        self.collection_id = Some(request.collection_id.clone());
        self.unsaved_changes = false;
    }

    pub(crate) fn apply(&mut self, patch: TabPatch) {
        if let Some(title) = patch.title {
            self.title = title;
        }
        if let Some(method) = patch.method {
            self.method = method;
        }
        if let Some(url) = patch.url {
            self.url = url;
        }
        if let Some(body) = patch.body {
            self.body = body;
        }
        if let Some(headers) = patch.headers {
            self.headers = headers;
        }
        if let Some(parameters) = patch.parameters {
            self.parameters = parameters;
        }
    }

    /// The fields a save would write.
    pub fn to_draft(&self) -> RequestDraft {
        RequestDraft {
            name: self.title.clone(),
            method: self.method,
            url: self.url.clone(),
            headers: self.headers.clone(),
            parameters: self.parameters.clone(),
            body: self.body.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct TabPatch {
    pub title: Option<String>,
    pub method: Option<HttpMethod>,
    pub url: Option<String>,
    pub body: Option<String>,
    pub headers: Option<OrderedPairs>,
    pub parameters: Option<OrderedPairs>,
}

impl TabPatch {
    pub fn title(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            ..Default::default()
        }
    }

    pub fn url(url: impl Into<String>) -> Self {
        Self {
            url: Some(url.into()),
            ..Default::default()
        }
    }
}
