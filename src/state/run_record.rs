use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::response_state::{ExecutionFailure, ExecutionResponse};

/// Status text written when the transport could not complete the call.
pub const STATUS_FAILED: &str = "Failed";
/// Status text written when the call was never issued or could not be recorded.
pub const STATUS_ERROR: &str = "Error";

/// One execution attempt. Written once, never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    pub id: String,
    pub request_id: String,
    /// 0 when the call never completed.
    pub status: u16,
    pub status_text: Option<String>,
    #[serde(default)]
    pub response_headers: Vec<(String, String)>,
    #[serde(default)]
    pub response_body: String,
    pub duration_ms: u64,
    pub created_at: DateTime<Utc>,
}

impl RunRecord {
    fn base(request_id: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            request_id: request_id.to_string(),
            status: 0,
            status_text: None,
            response_headers: Vec::new(),
            response_body: String::new(),
            duration_ms: 0,
            created_at: Utc::now(),
        }
    }

    pub fn from_response(request_id: &str, response: &ExecutionResponse) -> Self {
        Self {
            status: response.status,
            status_text: Some(response.status_text.clone()),
            response_headers: response.headers.clone(),
            response_body: response.data.to_body_string(),
            duration_ms: response.duration_ms,
            ..Self::base(request_id)
        }
    }

    pub fn from_failure(request_id: &str, failure: &ExecutionFailure) -> Self {
        Self {
            status_text: Some(STATUS_FAILED.to_string()),
            response_body: failure.message.clone(),
            duration_ms: failure.duration_ms,
            ..Self::base(request_id)
        }
    }

    /// The request could not even be built.
    pub fn from_error(request_id: &str, message: impl Into<String>) -> Self {
        Self {
            status_text: Some(STATUS_ERROR.to_string()),
            response_body: message.into(),
            ..Self::base(request_id)
        }
    }

    pub fn is_failure(&self) -> bool {
        self.status == 0
    }
}
