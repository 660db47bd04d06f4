//! In-memory playground state: the open tabs and which one is active.
//!
//! Every operation rewrites the tab list as a whole under `&mut self`, and
//! unknown tab ids are no-ops.

use super::request_state::RequestDefinition;
use super::tab::{Tab, TabPatch, TabResponse};
use crate::http::builder::ExecutionConfig;
use crate::runner::RunOutcome;

#[derive(Debug, Clone, Default)]
pub struct PlaygroundSession {
    tabs: Vec<Tab>,
    active_tab_id: Option<String>,
}

impl PlaygroundSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tabs(&self) -> &[Tab] {
        &self.tabs
    }

    pub fn tab(&self, id: &str) -> Option<&Tab> {
        self.tabs.iter().find(|t| t.id == id)
    }

    pub fn active_tab_id(&self) -> Option<&str> {
        self.active_tab_id.as_deref()
    }

    pub fn active_tab(&self) -> Option<&Tab> {
        self.active_tab_id.as_deref().and_then(|id| self.tab(id))
    }

    fn tab_mut(&mut self, id: &str) -> Option<&mut Tab> {
        self.tabs.iter_mut().find(|t| t.id == id)
    }

    /// Open a blank draft and make it active. Returns the new tab's id.
    pub fn add_tab(&mut self) -> String {
        let tab = Tab::draft();
        let id = tab.id.clone();
        self.tabs.push(tab);
        self.active_tab_id = Some(id.clone());
        tracing::debug!(tab_id = %id, "tab added");
        id
    }

    /// Activation falls to the first remaining tab when the active one closes.
    pub fn close_tab(&mut self, id: &str) {
        let Some(pos) = self.tabs.iter().position(|t| t.id == id) else {
            return;
        };
        self.tabs.remove(pos);
        if self.active_tab_id.as_deref() == Some(id) {
            self.active_tab_id = self.tabs.first().map(|t| t.id.clone());
        }
        tracing::debug!(tab_id = id, "tab closed");
    }

    pub fn set_active_tab(&mut self, id: &str) {
        if self.tab(id).is_some() {
            self.active_tab_id = Some(id.to_string());
        }
    }

    /// Always marks the tab dirty, even when nothing actually changed.
    pub fn update_tab(&mut self, id: &str, patch: TabPatch) {
        if let Some(tab) = self.tab_mut(id) {
            tab.apply(patch);
            tab.unsaved_changes = true;
        }
    }

    pub fn mark_unsaved(&mut self, id: &str, value: bool) {
        if let Some(tab) = self.tab_mut(id) {
            tab.unsaved_changes = value;
        }
    }

    /// Focus the tab already showing `request`, or open a clean one for it.
    pub fn open_request_tab(&mut self, request: &RequestDefinition) -> String {
        let existing = self
            .tabs
            .iter()
            .find(|t| t.request_id.as_deref() == Some(request.id.as_str()))
            .map(|t| t.id.clone());
        let id = match existing {
            Some(id) => id,
            None => {
                let tab = Tab::attached(request);
                let id = tab.id.clone();
                self.tabs.push(tab);
                id
            }
        };
        self.active_tab_id = Some(id.clone());
        id
    }

    /// Promote a draft to the saved request's identity.
    ///
    /// The tab keeps its position in the list but takes on `saved.id`, so no
    /// tab with the old client id remains. If another tab was already showing
    /// `saved`, that duplicate is dropped. A run that lands for the old id
    /// after this point is ignored by [`record_run`](Self::record_run).
    ///
    /// A tab already attached to another request is left alone.
    pub fn attach_from_save(&mut self, tab_id: &str, saved: &RequestDefinition) {
        let Some(tab) = self.tab(tab_id) else {
            return;
        };
        if !tab.is_draft() && tab.request_id.as_deref() != Some(saved.id.as_str()) {
            tracing::warn!(tab_id, request_id = %saved.id, "tab already attached elsewhere, not re-pointing");
            return;
        }
        if tab_id != saved.id {
            self.tabs.retain(|t| t.id != saved.id);
        }
        if let Some(tab) = self.tab_mut(tab_id) {
            tab.mirror(saved);
        }
        self.active_tab_id = Some(saved.id.clone());
        tracing::debug!(from = tab_id, to = %saved.id, "draft attached");
    }

    /// Reflect a finished run in the tab's status indicator.
    pub fn record_run(&mut self, tab_id: &str, outcome: &RunOutcome) {
        if let Some(tab) = self.tab_mut(tab_id) {
            tab.last_response = Some(TabResponse::from_outcome(outcome));
        }
    }

    /// Inline config for running the tab as it currently reads.
    pub fn execution_config(&self, tab_id: &str) -> Option<ExecutionConfig> {
        self.tab(tab_id).map(|tab| ExecutionConfig {
            method: tab.method,
            url: tab.url.clone(),
            headers: tab.headers.clone(),
            params: tab.parameters.clone(),
            body: (!tab.body.is_empty()).then(|| tab.body.clone()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::request_state::{HttpMethod, KeyValue, RequestDraft, UNTITLED};
    use crate::state::response_state::{ExecutionResponse, ResponseData};
    use crate::state::run_record::RunRecord;
    use pretty_assertions::assert_eq;

    fn saved(id: &str, name: &str) -> RequestDefinition {
        let mut draft = RequestDraft::new(name, HttpMethod::Post, "https://example.test/users");
        draft.headers = vec![KeyValue::new("Accept", "application/json")];
        draft.body = "{}".into();
        let mut def = RequestDefinition::from_draft("C1", draft);
        def.id = id.to_string();
        def
    }

    fn ids(session: &PlaygroundSession) -> Vec<&str> {
        session.tabs().iter().map(|t| t.id.as_str()).collect()
    }

    #[test]
    fn test_add_tab_is_active_dirty_draft() {
        let mut session = PlaygroundSession::new();
        let id = session.add_tab();
        let tab = session.active_tab().unwrap();
        assert_eq!(tab.id, id);
        assert_eq!(tab.title, UNTITLED);
        assert_eq!(tab.method, HttpMethod::Get);
        assert!(tab.url.is_empty());
        assert!(tab.is_draft());
        assert!(tab.unsaved_changes);
    }

    #[test]
    fn test_close_active_tab_falls_to_first_remaining() {
        let mut session = PlaygroundSession::new();
        let t1 = session.add_tab();
        let t2 = session.add_tab();
        let t3 = session.add_tab();
        session.set_active_tab(&t2);

        session.close_tab(&t2);
        assert_eq!(ids(&session), vec![t1.as_str(), t3.as_str()]);
        assert_eq!(session.active_tab_id(), Some(t1.as_str()));
    }

    #[test]
    fn test_close_inactive_tab_keeps_selection() {
        let mut session = PlaygroundSession::new();
        let t1 = session.add_tab();
        let t2 = session.add_tab();
        session.close_tab(&t1);
        assert_eq!(session.active_tab_id(), Some(t2.as_str()));

        session.close_tab(&t2);
        assert!(session.tabs().is_empty());
        assert_eq!(session.active_tab_id(), None);
    }

    #[test]
    fn test_unknown_ids_are_no_ops() {
        let mut session = PlaygroundSession::new();
        let t1 = session.add_tab();
        session.close_tab("nope");
        session.set_active_tab("nope");
        session.update_tab("nope", TabPatch::title("x"));
        session.mark_unsaved("nope", false);
        session.attach_from_save("nope", &saved("B", "b"));
        assert_eq!(ids(&session), vec![t1.as_str()]);
        assert_eq!(session.active_tab_id(), Some(t1.as_str()));
    }

    #[test]
    fn test_update_tab_always_marks_dirty() {
        let mut session = PlaygroundSession::new();
        let id = session.open_request_tab(&saved("R1", "list"));
        assert!(!session.tab(&id).unwrap().unsaved_changes);

        session.update_tab(&id, TabPatch::title("list"));
        let tab = session.tab(&id).unwrap();
        assert_eq!(tab.title, "list");
        assert!(tab.unsaved_changes);

        session.mark_unsaved(&id, false);
        assert!(!session.tab(&id).unwrap().unsaved_changes);
    }

    #[test]
    fn test_successive_field_edits_are_kept() {
        let mut session = PlaygroundSession::new();
        let id = session.add_tab();
        session.update_tab(&id, TabPatch::url("https://example.test"));
        session.update_tab(&id, TabPatch::title("ping"));
        let tab = session.tab(&id).unwrap();
        assert_eq!(tab.url, "https://example.test");
        assert_eq!(tab.title, "ping");
    }

    #[test]
    fn test_open_request_tab_twice_only_changes_active() {
        let mut session = PlaygroundSession::new();
        let req = saved("R1", "list");
        let first = session.open_request_tab(&req);
        let other = session.add_tab();
        assert_eq!(session.active_tab_id(), Some(other.as_str()));

        let tabs_before = session.tabs().to_vec();
        let second = session.open_request_tab(&req);
        assert_eq!(first, second);
        assert_eq!(session.tabs(), tabs_before.as_slice());
        assert_eq!(session.active_tab_id(), Some("R1"));
        assert_eq!(
            session
                .tabs()
                .iter()
                .filter(|t| t.request_id.as_deref() == Some("R1"))
                .count(),
            1
        );
    }

    #[test]
    fn test_open_request_tab_mirrors_fields_clean() {
        let mut session = PlaygroundSession::new();
        let req = saved("R1", "create user");
        session.open_request_tab(&req);
        let tab = session.active_tab().unwrap();
        assert_eq!(tab.id, "R1");
        assert_eq!(tab.title, "create user");
        assert_eq!(tab.method, HttpMethod::Post);
        assert_eq!(tab.headers, req.headers);
        assert_eq!(tab.collection_id.as_deref(), Some("C1"));
        assert!(!tab.unsaved_changes);
    }

    #[test]
    fn test_attach_from_save_promotes_identity() {
        let mut session = PlaygroundSession::new();
        let before = session.add_tab();
        let a = session.add_tab();
        let after = session.add_tab();
        session.update_tab(&a, TabPatch::url("https://example.test/users"));

        session.attach_from_save(&a, &saved("B", "users"));

        assert!(session.tab(&a).is_none());
        assert_eq!(session.tabs().iter().filter(|t| t.id == "B").count(), 1);
        assert_eq!(ids(&session), vec![before.as_str(), "B", after.as_str()]);
        let tab = session.tab("B").unwrap();
        assert_eq!(tab.request_id.as_deref(), Some("B"));
        assert!(!tab.unsaved_changes);
        assert_eq!(session.active_tab_id(), Some("B"));
    }

    #[test]
    fn test_attach_from_save_drops_existing_tab_for_same_request() {
        let mut session = PlaygroundSession::new();
        let req = saved("B", "users");
        session.open_request_tab(&req);
        let a = session.add_tab();

        session.attach_from_save(&a, &req);
        assert_eq!(ids(&session), vec!["B"]);
        assert_eq!(session.active_tab_id(), Some("B"));
    }

    #[test]
    fn test_attach_from_save_ignores_tab_attached_elsewhere() {
        let mut session = PlaygroundSession::new();
        let r1 = session.open_request_tab(&saved("R1", "list"));
        let draft = session.add_tab();
        let before = session.tabs().to_vec();

        session.attach_from_save(&r1, &saved("R2", "other"));
        assert_eq!(session.tabs(), before.as_slice());
        assert_eq!(session.tab("R1").unwrap().request_id.as_deref(), Some("R1"));
        assert!(session.tab("R2").is_none());
        assert_eq!(session.active_tab_id(), Some(draft.as_str()));

        // re-attaching to the same request is still allowed
        session.update_tab(&r1, TabPatch::title("renamed"));
        session.attach_from_save(&r1, &saved("R1", "renamed"));
        assert!(!session.tab("R1").unwrap().unsaved_changes);
        assert_eq!(session.active_tab_id(), Some("R1"));
    }

    #[test]
    fn test_record_run_and_execution_config() {
        let mut session = PlaygroundSession::new();
        let id = session.add_tab();
        session.update_tab(
            &id,
            TabPatch {
                method: Some(HttpMethod::Patch),
                url: Some("https://example.test/a".into()),
                parameters: Some(vec![KeyValue::new("page", "2")]),
                ..Default::default()
            },
        );
        let config = session.execution_config(&id).unwrap();
        assert_eq!(config.method, HttpMethod::Patch);
        assert_eq!(config.params, vec![KeyValue::new("page", "2")]);
        assert_eq!(config.body, None);

        session.mark_unsaved(&id, false);
        let response = ExecutionResponse {
            status: 200,
            status_text: "OK".into(),
            headers: Vec::new(),
            data: ResponseData::Text("ok".into()),
            duration_ms: 9,
            size: 2,
        };
        let outcome = RunOutcome::Succeeded {
            run_record: RunRecord::from_response(&id, &response),
            response,
        };
        session.record_run(&id, &outcome);
        let tab = session.tab(&id).unwrap();
        assert!(matches!(
            tab.last_response,
            Some(TabResponse::Received { status: 200, duration_ms: 9, .. })
        ));
        assert!(!tab.unsaved_changes);
        assert!(session.execution_config("nope").is_none());
    }
}
