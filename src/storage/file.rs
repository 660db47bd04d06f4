//! On-disk stores.
//!
//! Layout under the data directory:
//!
//! ```text
//! collections/<collection-id>/collection.toml
//! collections/<collection-id>/requests/<request-id>.toml
//! runs/<request-id>.jsonl
//! ```

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::Utc;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use super::{CollectionStore, RequestStore, RunLogStore, StoreError, StoreResult};
use crate::state::collection::Collection;
use crate::state::request_state::{HttpMethod, RequestDefinition, RequestDraft, RequestPatch};
use crate::state::run_record::RunRecord;

#[derive(Debug)]
pub struct FileStore {
    root: PathBuf,
    // serializes read-modify-write cycles and run appends
    write_lock: Mutex<()>,
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// `<data_dir>/reqplay`, or `./reqplay` when the platform has no data dir.
    pub fn default_root() -> PathBuf {
        let base = dirs::data_dir().unwrap_or_else(|| PathBuf::from("."));
        base.join("reqplay")
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn collections_dir(&self) -> PathBuf {
        self.root.join("collections")
    }

    fn collection_dir(&self, collection_id: &str) -> PathBuf {
        self.collections_dir().join(collection_id)
    }

    fn request_path(&self, collection_id: &str, request_id: &str) -> PathBuf {
        self.collection_dir(collection_id)
            .join("requests")
            .join(format!("{request_id}.toml"))
    }

    fn runs_path(&self, request_id: &str) -> PathBuf {
        self.root.join("runs").join(format!("{request_id}.jsonl"))
    }

    async fn collection_exists(&self, collection_id: &str) -> bool {
        is_safe_segment(collection_id)
            && fs::try_exists(self.collection_dir(collection_id).join("collection.toml"))
                .await
                .unwrap_or(false)
    }

    /// Requests are addressed by id alone here, so scan every collection.
    async fn find_request(&self, id: &str) -> StoreResult<Option<RequestDefinition>> {
        if !is_safe_segment(id) {
            return Ok(None);
        }
        let mut entries = match fs::read_dir(self.collections_dir()).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path().join("requests").join(format!("{id}.toml"));
            if let Some(request) = read_toml::<RequestDefinition>(&path).await? {
                return Ok(Some(request));
            }
        }
        Ok(None)
    }

    async fn write_request(&self, request: &RequestDefinition) -> StoreResult<()> {
        let path = self.request_path(&request.collection_id, &request.id);
        write_toml(&path, request).await
    }

    async fn modify<F>(&self, id: &str, f: F) -> StoreResult<RequestDefinition>
    where
        F: FnOnce(&mut RequestDefinition) -> StoreResult<()> + Send,
    {
        let _guard = self.write_lock.lock().await;
        let mut request = self
            .find_request(id)
            .await?
            .ok_or_else(|| StoreError::request(id))?;
        f(&mut request)?;
        self.write_request(&request).await?;
        Ok(request)
    }
}

fn is_safe_segment(id: &str) -> bool {
    !id.is_empty() && id != "." && id != ".." && !id.contains(['/', '\\'])
}

async fn read_toml<T: DeserializeOwned>(path: &Path) -> StoreResult<Option<T>> {
    match fs::read_to_string(path).await {
        Ok(content) => Ok(Some(toml::from_str(&content)?)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

async fn write_toml<T: Serialize>(path: &Path, value: &T) -> StoreResult<()> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir).await?;
    }
    let content = toml::to_string_pretty(value)?;
    fs::write(path, content).await?;
    Ok(())
}

#[async_trait]
impl CollectionStore for FileStore {
    async fn add_collection(&self, name: &str) -> StoreResult<Collection> {
        let collection = Collection::new(name);
        let path = self.collection_dir(&collection.id).join("collection.toml");
        write_toml(&path, &collection).await?;
        Ok(collection)
    }

    async fn get_collection(&self, id: &str) -> StoreResult<Option<Collection>> {
        if !is_safe_segment(id) {
            return Ok(None);
        }
        read_toml(&self.collection_dir(id).join("collection.toml")).await
    }

    async fn list_collections(&self) -> StoreResult<Vec<Collection>> {
        let mut entries = match fs::read_dir(self.collections_dir()).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let mut collections = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path().join("collection.toml");
            match read_toml::<Collection>(&path).await {
                Ok(Some(col)) => collections.push(col),
                Ok(None) => {}
                Err(e) => tracing::warn!(path = %path.display(), error = %e, "skipping unreadable collection"),
            }
        }
        collections.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(collections)
    }
}

#[async_trait]
impl RequestStore for FileStore {
    async fn create(&self, collection_id: &str, draft: RequestDraft) -> StoreResult<RequestDefinition> {
        if !self.collection_exists(collection_id).await {
            return Err(StoreError::collection(collection_id));
        }
        let request = RequestDefinition::from_draft(collection_id, draft);
        self.write_request(&request).await?;
        tracing::debug!(request_id = %request.id, collection_id, "request created");
        Ok(request)
    }

    async fn update(&self, id: &str, patch: RequestPatch) -> StoreResult<RequestDefinition> {
        self.modify(id, |request| {
            request.apply(patch);
            Ok(())
        })
        .await
    }

    async fn edit(
        &self,
        id: &str,
        collection_id: &str,
        name: &str,
        method: HttpMethod,
        url: &str,
    ) -> StoreResult<RequestDefinition> {
        let (name, url) = (name.to_string(), url.to_string());
        self.modify(id, |request| {
            if request.collection_id != collection_id {
                return Err(StoreError::request(id));
            }
            request.apply(RequestPatch {
                name: Some(name),
                method: Some(method),
                url: Some(url),
                ..Default::default()
            });
            Ok(())
        })
        .await
    }

    async fn get(&self, id: &str) -> StoreResult<Option<RequestDefinition>> {
        self.find_request(id).await
    }

    async fn list_by_collection(&self, collection_id: &str) -> StoreResult<Vec<RequestDefinition>> {
        if !is_safe_segment(collection_id) {
            return Ok(Vec::new());
        }
        let dir = self.collection_dir(collection_id).join("requests");
        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let mut requests = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("toml") {
                continue;
            }
            match read_toml::<RequestDefinition>(&path).await {
                Ok(Some(request)) => requests.push(request),
                Ok(None) => {}
                Err(e) => tracing::warn!(path = %path.display(), error = %e, "skipping unreadable request"),
            }
        }
        requests.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(requests)
    }

    async fn delete(&self, id: &str, collection_id: &str) -> StoreResult<()> {
        if !is_safe_segment(id) || !is_safe_segment(collection_id) {
            return Err(StoreError::request(id));
        }
        let _guard = self.write_lock.lock().await;
        match fs::remove_file(self.request_path(collection_id, id)).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => return Err(StoreError::request(id)),
            Err(e) => return Err(e.into()),
        }
        match fs::remove_file(self.runs_path(id)).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        tracing::debug!(request_id = id, collection_id, "request deleted");
        Ok(())
    }

    async fn set_cached_response(&self, id: &str, body: String) -> StoreResult<RequestDefinition> {
        self.modify(id, |request| {
            request.cached_response = Some(body);
            request.updated_at = Utc::now();
            Ok(())
        })
        .await
    }
}

#[async_trait]
impl RunLogStore for FileStore {
    async fn append(&self, record: RunRecord) -> StoreResult<RunRecord> {
        if !is_safe_segment(&record.request_id) {
            return Err(StoreError::request(&record.request_id));
        }
        let mut line = serde_json::to_string(&record)?;
        line.push('\n');

        let path = self.runs_path(&record.request_id);
        let _guard = self.write_lock.lock().await;
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).await?;
        }
        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;
        Ok(record)
    }

    async fn list_by_request(&self, request_id: &str) -> StoreResult<Vec<RunRecord>> {
        if !is_safe_segment(request_id) {
            return Ok(Vec::new());
        }
        let content = match fs::read_to_string(self.runs_path(request_id)).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| serde_json::from_str(line).map_err(StoreError::from))
            .collect()
    }
}
