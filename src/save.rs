//! Save protocol for the active playground tab.

use crate::error::{AppError, Result};
use crate::state::request_state::{RequestDefinition, RequestPatch};
use crate::state::session::PlaygroundSession;
use crate::storage::RequestStore;

#[derive(Debug, Clone, PartialEq)]
pub enum SaveOutcome {
    /// The attached request was overwritten and the tab is clean.
    Updated(RequestDefinition),
    /// A draft was created in the target collection and the tab promoted.
    Created(RequestDefinition),
    /// The active tab is a draft; the caller must choose a collection.
    NeedsCollection,
    NoActiveTab,
}

/// Saves are allowed on clean tabs too; the write is simply repeated.
///
/// On any error the session is left exactly as it was.
pub async fn save_active_tab(
    session: &mut PlaygroundSession,
    requests: &dyn RequestStore,
    target_collection: Option<&str>,
) -> Result<SaveOutcome> {
    let Some(tab) = session.active_tab() else {
        return Ok(SaveOutcome::NoActiveTab);
    };
    if tab.is_draft() && target_collection.is_none() {
        return Ok(SaveOutcome::NeedsCollection);
    }
    if tab.title.trim().is_empty() {
        return Err(AppError::Validation("name must not be empty".into()));
    }
    if tab.url.trim().is_empty() {
        return Err(AppError::Validation("URL must not be empty".into()));
    }

    let tab_id = tab.id.clone();
    let draft = tab.to_draft();

    match (tab.request_id.clone(), target_collection) {
        (Some(request_id), _) => {
            let saved = requests.update(&request_id, RequestPatch::from(draft)).await?;
            session.mark_unsaved(&tab_id, false);
            tracing::info!(request_id, "request saved");
            Ok(SaveOutcome::Updated(saved))
        }
        (None, Some(collection_id)) => {
            let saved = requests.create(collection_id, draft).await?;
            session.attach_from_save(&tab_id, &saved);
            tracing::info!(request_id = %saved.id, collection_id, "draft saved");
            Ok(SaveOutcome::Created(saved))
        }
        (None, None) => Ok(SaveOutcome::NeedsCollection),
    }
}
