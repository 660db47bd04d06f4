//! Runs saved or inline requests and records every attempt.

use std::sync::Arc;

use tracing::Instrument;

use crate::http::builder::{self, ExecutionConfig};
use crate::http::executor::Transport;
use crate::state::response_state::ExecutionResponse;
use crate::state::run_record::RunRecord;
use crate::storage::{RequestStore, RunLogStore, StoreError};

#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    Succeeded {
        run_record: RunRecord,
        response: ExecutionResponse,
    },
    /// `run_record` is `None` only when writing the record itself failed.
    Failed {
        error: String,
        run_record: Option<RunRecord>,
    },
}

impl RunOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, RunOutcome::Succeeded { .. })
    }

    pub fn run_record(&self) -> Option<&RunRecord> {
        match self {
            RunOutcome::Succeeded { run_record, .. } => Some(run_record),
            RunOutcome::Failed { run_record, .. } => run_record.as_ref(),
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            RunOutcome::Succeeded { .. } => None,
            RunOutcome::Failed { error, .. } => Some(error),
        }
    }
}

/// Stateless apart from its collaborators; safe to call concurrently.
pub struct Runner {
    transport: Arc<dyn Transport>,
    requests: Arc<dyn RequestStore>,
    runs: Arc<dyn RunLogStore>,
}

impl Runner {
    pub fn new(
        transport: Arc<dyn Transport>,
        requests: Arc<dyn RequestStore>,
        runs: Arc<dyn RunLogStore>,
    ) -> Self {
        Self {
            transport,
            requests,
            runs,
        }
    }

    /// Load the saved definition and run it. A missing request is the one
    /// case that produces no run record.
    pub async fn run_saved(&self, request_id: &str) -> Result<RunOutcome, StoreError> {
        let request = match self.requests.get(request_id).await {
            Ok(Some(request)) => request,
            Ok(None) => return Err(StoreError::request(request_id)),
            Err(e) => {
                tracing::error!(request_id, error = %e, "saved request could not be loaded");
                let cause = format!("loading the saved request failed: {e}");
                return Ok(self.record_error(request_id, cause).await);
            }
        };
        let config = ExecutionConfig::from(&request);
        Ok(self.run(request_id, config).await)
    }

    pub async fn run_inline(&self, request_id: &str, config: ExecutionConfig) -> RunOutcome {
        self.run(request_id, config).await
    }

    async fn run(&self, request_id: &str, config: ExecutionConfig) -> RunOutcome {
        let span = tracing::info_span!("run", request_id, method = %config.method, url = %config.url);
        self.run_inner(request_id, config).instrument(span).await
    }

    /// Write the failure record; if even that fails, report both causes.
    async fn record_failed(&self, record: RunRecord, cause: String) -> RunOutcome {
        match self.runs.append(record).await {
            Ok(record) => RunOutcome::Failed {
                error: cause,
                run_record: Some(record),
            },
            Err(e) => {
                tracing::error!(error = %e, "run record not written");
                RunOutcome::Failed {
                    error: format!("{cause}; recording the run also failed: {e}"),
                    run_record: None,
                }
            }
        }
    }

    /// The call was never issued.
    async fn record_error(&self, request_id: &str, cause: String) -> RunOutcome {
        let record = RunRecord::from_error(request_id, cause.clone());
        self.record_failed(record, cause).await
    }

    async fn run_inner(&self, request_id: &str, config: ExecutionConfig) -> RunOutcome {
        if let Err(e) = builder::validate(&config) {
            tracing::warn!(error = %e, "request not sent");
            return self.record_error(request_id, e.to_string()).await;
        }

        let response = match self.transport.execute(&config).await {
            Ok(response) => response,
            Err(failure) => {
                tracing::warn!(error = %failure.message, duration_ms = failure.duration_ms, "request failed");
                let cause = format!("request failed: {}", failure.message);
                return self
                    .record_failed(RunRecord::from_failure(request_id, &failure), cause)
                    .await;
            }
        };

        tracing::info!(
            status = response.status,
            duration_ms = response.duration_ms,
            size = %humansize::format_size(response.size, humansize::DECIMAL),
            "response received"
        );

        let record = match self.runs.append(RunRecord::from_response(request_id, &response)).await {
            Ok(record) => record,
            Err(e) => {
                tracing::error!(error = %e, "run record not written");
                return RunOutcome::Failed {
                    error: format!(
                        "request completed with status {}; recording the run failed: {e}",
                        response.status
                    ),
                    run_record: None,
                };
            }
        };

        if let Err(e) = self.refresh_cache(request_id, &response).await {
            tracing::error!(error = %e, "cached response not updated");
            return RunOutcome::Failed {
                error: format!(
                    "request completed with status {}; updating the saved request failed: {e}",
                    response.status
                ),
                run_record: Some(record),
            };
        }

        RunOutcome::Succeeded {
            run_record: record,
            response,
        }
    }

    /// Drafts have no saved definition to update.
    async fn refresh_cache(&self, request_id: &str, response: &ExecutionResponse) -> Result<(), StoreError> {
        match self
            .requests
            .set_cached_response(request_id, response.data.to_body_string())
            .await
        {
            Ok(_) => Ok(()),
            Err(StoreError::NotFound { .. }) => {
                tracing::debug!("no saved request, skipping cache");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::collection::Collection;
    use crate::state::request_state::{HttpMethod, RequestDraft};
    use crate::state::response_state::{ExecutionFailure, ResponseData};
    use crate::state::run_record::{STATUS_ERROR, STATUS_FAILED};
    use crate::storage::{MemoryStore, StoreResult};
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::sync::Mutex;

    /// Answers each call with the next scripted result.
    struct ScriptedTransport {
        script: Mutex<Vec<Result<ExecutionResponse, ExecutionFailure>>>,
        seen: Mutex<Vec<ExecutionConfig>>,
    }

    impl ScriptedTransport {
        fn new(mut script: Vec<Result<ExecutionResponse, ExecutionFailure>>) -> Arc<Self> {
            script.reverse();
            Arc::new(Self {
                script: Mutex::new(script),
                seen: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl Transport for ScriptedTransport {
        async fn execute(&self, config: &ExecutionConfig) -> Result<ExecutionResponse, ExecutionFailure> {
            self.seen.lock().unwrap().push(config.clone());
            self.script
                .lock()
                .unwrap()
                .pop()
                .unwrap_or_else(|| Err(ExecutionFailure::new("script exhausted", 0)))
        }
    }

    struct BrokenRunLog;

    #[async_trait]
    impl RunLogStore for BrokenRunLog {
        async fn append(&self, _record: RunRecord) -> StoreResult<RunRecord> {
            Err(StoreError::Io(std::io::Error::other("disk full")))
        }

        async fn list_by_request(&self, _request_id: &str) -> StoreResult<Vec<RunRecord>> {
            Ok(Vec::new())
        }
    }

    fn ok_json(status: u16, body: serde_json::Value, duration_ms: u64) -> Result<ExecutionResponse, ExecutionFailure> {
        let data = ResponseData::Json(body);
        Ok(ExecutionResponse {
            status,
            status_text: "OK".into(),
            headers: Vec::new(),
            size: data.to_body_string().len() as u64,
            data,
            duration_ms,
        })
    }

    async fn saved_request(store: &MemoryStore, url: &str) -> String {
        store.insert_collection(Collection { id: "C1".into(), ..Collection::new("C1") }).await;
        store
            .create("C1", RequestDraft::new("ok", HttpMethod::Get, url))
            .await
            .unwrap()
            .id
    }

    #[tokio::test]
    async fn test_run_saved_records_and_caches() {
        let store = Arc::new(MemoryStore::new());
        let id = saved_request(&store, "https://example.test/ok").await;
        let transport = ScriptedTransport::new(vec![ok_json(200, json!({"x": 1}), 12)]);
        let runner = Runner::new(transport.clone(), store.clone(), store.clone());

        let outcome = runner.run_saved(&id).await.unwrap();
        assert!(outcome.is_success());

        let runs = store.list_by_request(&id).await.unwrap();
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].status, 200);
        assert_eq!(runs[0].duration_ms, 12);
        assert_eq!(Some(&runs[0]), outcome.run_record());

        let saved = store.get(&id).await.unwrap().unwrap();
        assert_eq!(saved.cached_response.as_deref(), Some(r#"{"x":1}"#));
        assert_eq!(transport.seen.lock().unwrap()[0].url, "https://example.test/ok");
    }

    #[tokio::test]
    async fn test_transport_failure_is_recorded_and_cache_untouched() {
        let store = Arc::new(MemoryStore::new());
        let id = saved_request(&store, "https://example.test/ok").await;
        store.set_cached_response(&id, "previous".into()).await.unwrap();
        let transport = ScriptedTransport::new(vec![Err(ExecutionFailure::new("connection refused", 3))]);
        let runner = Runner::new(transport, store.clone(), store.clone());

        let outcome = runner.run_saved(&id).await.unwrap();
        assert!(!outcome.is_success());
        assert!(outcome.error().unwrap().contains("connection refused"));

        let record = outcome.run_record().unwrap();
        assert_eq!(record.status, 0);
        assert_eq!(record.status_text.as_deref(), Some(STATUS_FAILED));
        assert_eq!(record.response_body, "connection refused");
        assert_eq!(record.duration_ms, 3);

        let saved = store.get(&id).await.unwrap().unwrap();
        assert_eq!(saved.cached_response.as_deref(), Some("previous"));
    }

    #[tokio::test]
    async fn test_run_saved_missing_request_is_not_found() {
        let store = Arc::new(MemoryStore::new());
        let runner = Runner::new(ScriptedTransport::new(vec![]), store.clone(), store.clone());
        let err = runner.run_saved("ghost").await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound { kind: "request", .. }));
        assert!(store.list_by_request("ghost").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unsendable_config_records_error_without_calling_transport() {
        let store = Arc::new(MemoryStore::new());
        let id = saved_request(&store, "").await;
        let transport = ScriptedTransport::new(vec![]);
        let runner = Runner::new(transport.clone(), store.clone(), store.clone());

        let outcome = runner.run_saved(&id).await.unwrap();
        let record = outcome.run_record().unwrap();
        assert_eq!(record.status, 0);
        assert_eq!(record.status_text.as_deref(), Some(STATUS_ERROR));
        assert_eq!(record.duration_ms, 0);
        assert!(transport.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_every_call_appends_one_record_in_order() {
        let store = Arc::new(MemoryStore::new());
        let id = saved_request(&store, "https://example.test/ok").await;
        let transport = ScriptedTransport::new(vec![
            ok_json(200, json!(1), 5),
            Err(ExecutionFailure::new("timeout", 30_000)),
            ok_json(404, json!({"error": "missing"}), 7),
        ]);
        let runner = Runner::new(transport, store.clone(), store.clone());

        let mut returned = Vec::new();
        for _ in 0..3 {
            let outcome = runner.run_saved(&id).await.unwrap();
            returned.push(outcome.run_record().cloned().unwrap());
        }

        let runs = store.list_by_request(&id).await.unwrap();
        assert_eq!(runs, returned);
        assert_eq!(runs.iter().map(|r| r.status).collect::<Vec<_>>(), vec![200, 0, 404]);

        // a 4xx is still a response: it becomes the cached body
        let saved = store.get(&id).await.unwrap().unwrap();
        assert_eq!(saved.cached_response.as_deref(), Some(r#"{"error":"missing"}"#));
    }

    #[tokio::test]
    async fn test_inline_draft_is_logged_but_not_cached() {
        let store = Arc::new(MemoryStore::new());
        let transport = ScriptedTransport::new(vec![ok_json(201, json!({"id": 9}), 4)]);
        let runner = Runner::new(transport, store.clone(), store.clone());

        let config = ExecutionConfig::new(HttpMethod::Post, "https://example.test/items");
        let outcome = runner.run_inline("draft-tab-1", config).await;
        assert!(outcome.is_success());
        assert_eq!(store.list_by_request("draft-tab-1").await.unwrap().len(), 1);
        assert!(store.get("draft-tab-1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_run_log_failure_reports_both_causes() {
        let store = Arc::new(MemoryStore::new());
        let transport = ScriptedTransport::new(vec![
            Err(ExecutionFailure::new("dns lookup failed", 1)),
            ok_json(200, json!({}), 1),
        ]);
        let runner = Runner::new(transport, store.clone(), Arc::new(BrokenRunLog));

        let config = ExecutionConfig::new(HttpMethod::Get, "https://example.test");
        let outcome = runner.run_inline("r", config.clone()).await;
        let error = outcome.error().unwrap();
        assert!(error.contains("dns lookup failed"));
        assert!(error.contains("disk full"));
        assert!(outcome.run_record().is_none());

        let outcome = runner.run_inline("r", config).await;
        assert!(!outcome.is_success());
        assert!(outcome.error().unwrap().contains("status 200"));
        assert!(outcome.run_record().is_none());
    }

    #[tokio::test]
    async fn test_concurrent_runs_are_independent() {
        let store = Arc::new(MemoryStore::new());
        let id = saved_request(&store, "https://example.test/ok").await;
        let script = (0..8).map(|i| ok_json(200, json!(i), i)).collect();
        let runner = Arc::new(Runner::new(ScriptedTransport::new(script), store.clone(), store.clone()));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let runner = Arc::clone(&runner);
                let id = id.clone();
                tokio::spawn(async move { runner.run_saved(&id).await.unwrap() })
            })
            .collect();
        for handle in handles {
            assert!(handle.await.unwrap().is_success());
        }

        let runs = store.list_by_request(&id).await.unwrap();
        assert_eq!(runs.len(), 8);
        let mut ids: Vec<_> = runs.iter().map(|r| r.id.clone()).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 8);
    }
}
