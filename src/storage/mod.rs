//! Persistence ports and their implementations.
//!
//! The stores do no authorization of their own: callers are expected to have
//! scoped the ids to the current user's workspace before calling in.

pub mod file;
pub mod memory;

use async_trait::async_trait;

use crate::state::collection::Collection;
use crate::state::request_state::{HttpMethod, RequestDefinition, RequestDraft, RequestPatch};
use crate::state::run_record::RunRecord;

pub use file::FileStore;
pub use memory::MemoryStore;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("{kind} '{id}' not found")]
    NotFound { kind: &'static str, id: String },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    TomlDe(#[from] toml::de::Error),
    #[error("TOML write error: {0}")]
    TomlSer(#[from] toml::ser::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl StoreError {
    pub fn request(id: &str) -> Self {
        StoreError::NotFound { kind: "request", id: id.to_string() }
    }

    pub fn collection(id: &str) -> Self {
        StoreError::NotFound { kind: "collection", id: id.to_string() }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Collections are owned elsewhere; the engine only creates them for local
/// use and checks that they exist.
#[async_trait]
pub trait CollectionStore: Send + Sync {
    async fn add_collection(&self, name: &str) -> StoreResult<Collection>;

    async fn get_collection(&self, id: &str) -> StoreResult<Option<Collection>>;

    async fn list_collections(&self) -> StoreResult<Vec<Collection>>;
}

#[async_trait]
pub trait RequestStore: Send + Sync {
    /// Fails with `NotFound` when the collection does not exist.
    async fn create(&self, collection_id: &str, draft: RequestDraft) -> StoreResult<RequestDefinition>;

    async fn update(&self, id: &str, patch: RequestPatch) -> StoreResult<RequestDefinition>;

    /// Rename/edit scoped to the owning collection.
    async fn edit(
        &self,
        id: &str,
        collection_id: &str,
        name: &str,
        method: HttpMethod,
        url: &str,
    ) -> StoreResult<RequestDefinition>;

    async fn get(&self, id: &str) -> StoreResult<Option<RequestDefinition>>;

    /// Oldest first.
    async fn list_by_collection(&self, collection_id: &str) -> StoreResult<Vec<RequestDefinition>>;

    /// Also removes the request's run history.
    async fn delete(&self, id: &str, collection_id: &str) -> StoreResult<()>;

    async fn set_cached_response(&self, id: &str, body: String) -> StoreResult<RequestDefinition>;
}

/// Append-only run history. There is no update or delete.
#[async_trait]
pub trait RunLogStore: Send + Sync {
    async fn append(&self, record: RunRecord) -> StoreResult<RunRecord>;

    /// In append order.
    async fn list_by_request(&self, request_id: &str) -> StoreResult<Vec<RunRecord>>;
}
