use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use super::{CollectionStore, RequestStore, RunLogStore, StoreError, StoreResult};
use crate::state::collection::Collection;
use crate::state::request_state::{HttpMethod, RequestDefinition, RequestDraft, RequestPatch};
use crate::state::run_record::RunRecord;

#[derive(Debug, Default)]
struct Inner {
    collections: Vec<Collection>,
    requests: Vec<RequestDefinition>,
    runs: Vec<RunRecord>,
}

/// All three stores behind one lock, so a request delete and its run
/// cascade happen together.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a collection created elsewhere.
    pub async fn insert_collection(&self, collection: Collection) {
        let mut inner = self.inner.write().await;
        inner.collections.retain(|c| c.id != collection.id);
        inner.collections.push(collection);
    }
}

#[async_trait]
impl CollectionStore for MemoryStore {
    async fn add_collection(&self, name: &str) -> StoreResult<Collection> {
        let collection = Collection::new(name);
        self.inner.write().await.collections.push(collection.clone());
        Ok(collection)
    }

    async fn get_collection(&self, id: &str) -> StoreResult<Option<Collection>> {
        let inner = self.inner.read().await;
        Ok(inner.collections.iter().find(|c| c.id == id).cloned())
    }

    async fn list_collections(&self) -> StoreResult<Vec<Collection>> {
        Ok(self.inner.read().await.collections.clone())
    }
}

#[async_trait]
impl RequestStore for MemoryStore {
    async fn create(&self, collection_id: &str, draft: RequestDraft) -> StoreResult<RequestDefinition> {
        let mut inner = self.inner.write().await;
        if !inner.collections.iter().any(|c| c.id == collection_id) {
            return Err(StoreError::collection(collection_id));
        }
        let request = RequestDefinition::from_draft(collection_id, draft);
        inner.requests.push(request.clone());
        tracing::debug!(request_id = %request.id, collection_id, "request created");
        Ok(request)
    }

    async fn update(&self, id: &str, patch: RequestPatch) -> StoreResult<RequestDefinition> {
        let mut inner = self.inner.write().await;
        let request = inner
            .requests
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| StoreError::request(id))?;
        request.apply(patch);
        Ok(request.clone())
    }

    async fn edit(
        &self,
        id: &str,
        collection_id: &str,
        name: &str,
        method: HttpMethod,
        url: &str,
    ) -> StoreResult<RequestDefinition> {
        let mut inner = self.inner.write().await;
        let request = inner
            .requests
            .iter_mut()
            .find(|r| r.id == id && r.collection_id == collection_id)
            .ok_or_else(|| StoreError::request(id))?;
        request.apply(RequestPatch {
            name: Some(name.to_string()),
            method: Some(method),
            url: Some(url.to_string()),
            ..Default::default()
        });
        Ok(request.clone())
    }

    async fn get(&self, id: &str) -> StoreResult<Option<RequestDefinition>> {
        let inner = self.inner.read().await;
        Ok(inner.requests.iter().find(|r| r.id == id).cloned())
    }

    async fn list_by_collection(&self, collection_id: &str) -> StoreResult<Vec<RequestDefinition>> {
        let inner = self.inner.read().await;
        Ok(inner
            .requests
            .iter()
            .filter(|r| r.collection_id == collection_id)
            .cloned()
            .collect())
    }

    async fn delete(&self, id: &str, collection_id: &str) -> StoreResult<()> {
        let mut inner = self.inner.write().await;
        let pos = inner
            .requests
            .iter()
            .position(|r| r.id == id && r.collection_id == collection_id)
            .ok_or_else(|| StoreError::request(id))?;
        inner.requests.remove(pos);
        inner.runs.retain(|run| run.request_id != id);
        tracing::debug!(request_id = id, collection_id, "request deleted");
        Ok(())
    }

    async fn set_cached_response(&self, id: &str, body: String) -> StoreResult<RequestDefinition> {
        let mut inner = self.inner.write().await;
        let request = inner
            .requests
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| StoreError::request(id))?;
        request.cached_response = Some(body);
        request.updated_at = Utc::now();
        Ok(request.clone())
    }
}

#[async_trait]
impl RunLogStore for MemoryStore {
    async fn append(&self, record: RunRecord) -> StoreResult<RunRecord> {
        self.inner.write().await.runs.push(record.clone());
        Ok(record)
    }

    async fn list_by_request(&self, request_id: &str) -> StoreResult<Vec<RunRecord>> {
        let inner = self.inner.read().await;
        Ok(inner
            .runs
            .iter()
            .filter(|r| r.request_id == request_id)
            .cloned()
            .collect())
    }
}
