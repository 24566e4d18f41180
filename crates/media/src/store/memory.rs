//! In-memory media library for tests and embedding.

use std::{
    collections::{BTreeMap, HashMap},
    sync::Mutex,
};

use {
    aggregator_common::{MediaId, PostId},
    async_trait::async_trait,
};

use crate::{
    error::{Error, Result},
    mime::has_image_extension,
    ports::{MediaRecord, MediaStore, NewAttachment},
    sniff::image_size,
};

#[derive(Default)]
struct State {
    next_id: u64,
    records: BTreeMap<MediaId, MediaRecord>,
    contents: HashMap<MediaId, Vec<u8>>,
    thumbnails: HashMap<PostId, MediaId>,
    creates: usize,
    read_only: bool,
}

impl State {
    fn allocate(&mut self) -> MediaId {
        self.next_id += 1;
        MediaId::new(self.next_id)
    }

    fn insert(&mut self, filename: &str, bytes: Vec<u8>) -> MediaId {
        let id = self.allocate();
        self.records.insert(id, MediaRecord {
            id,
            filename: filename.to_string(),
            url: Some(memory_url(id, filename)),
            parent: None,
            description: String::new(),
            size: None,
            metadata: BTreeMap::new(),
        });
        self.contents.insert(id, bytes);
        id
    }
}

fn memory_url(id: MediaId, filename: &str) -> String {
    format!("memory://media/{id}/{filename}")
}

/// Media library held in a `Mutex`. Like the real library, it refuses files
/// whose name lacks an image extension.
#[derive(Default)]
pub struct MemoryMediaStore {
    state: Mutex<State>,
}

impl MemoryMediaStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Add an attachment directly, bypassing the import rules.
    pub fn insert_file(&self, filename: &str, bytes: &[u8]) -> MediaId {
        self.state().insert(filename, bytes.to_vec())
    }

    pub fn set_thumbnail(&self, post: PostId, id: MediaId) {
        self.state().thumbnails.insert(post, id);
    }

    /// When set, every create is rejected.
    pub fn set_read_only(&self, read_only: bool) {
        self.state().read_only = read_only;
    }

    /// Number of attachments created through [`MediaStore::create_from_local_file`].
    #[must_use]
    pub fn create_count(&self) -> usize {
        self.state().creates
    }

    #[must_use]
    pub fn contents(&self, id: MediaId) -> Option<Vec<u8>> {
        self.state().contents.get(&id).cloned()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.state().records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl MediaStore for MemoryMediaStore {
    async fn find_by_id(&self, id: MediaId) -> Result<Option<MediaRecord>> {
        Ok(self.state().records.get(&id).cloned())
    }

    async fn find_by_metadata(
        &self,
        field: &str,
        value: &str,
        limit: usize,
    ) -> Result<Vec<MediaRecord>> {
        Ok(self
            .state()
            .records
            .values()
            .filter(|record| record.meta(field) == Some(value))
            .take(limit)
            .cloned()
            .collect())
    }

    async fn create_from_local_file(&self, attachment: NewAttachment<'_>) -> Result<MediaId> {
        if !has_image_extension(attachment.filename) {
            return Err(Error::upstream(format!(
                "sorry, {} is not an allowed file type",
                attachment.filename
            )));
        }
        let bytes = std::fs::read(attachment.path)
            .map_err(|e| Error::io(format!("reading {}", attachment.path.display()), e))?;
        let size = image_size(attachment.path);

        let mut state = self.state();
        if state.read_only {
            return Err(Error::upstream("media library is read-only"));
        }
        let id = state.insert(attachment.filename, bytes);
        state.creates += 1;
        if let Some(record) = state.records.get_mut(&id) {
            record.parent = attachment.parent;
            record.description = attachment.description.to_string();
            record.size = size;
        }
        Ok(id)
    }

    async fn set_metadata(&self, id: MediaId, field: &str, value: &str) -> Result<()> {
        let mut state = self.state();
        let record = state
            .records
            .get_mut(&id)
            .ok_or(Error::NotFound { id })?;
        record.metadata.insert(field.to_string(), value.to_string());
        Ok(())
    }

    async fn url_of(&self, id: MediaId) -> Result<Option<String>> {
        Ok(self.state().records.get(&id).and_then(|r| r.url.clone()))
    }

    async fn thumbnail_of(&self, post: PostId) -> Result<Option<MediaId>> {
        Ok(self.state().thumbnails.get(&post).copied())
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, crate::ErrorKind, std::path::Path};

    fn attachment<'a>(path: &'a Path, filename: &'a str) -> NewAttachment<'a> {
        NewAttachment {
            path,
            filename,
            parent: Some(PostId::new(3)),
            description: "imported",
        }
    }

    #[tokio::test]
    async fn create_copies_file_and_metadata_is_searchable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tmp");
        std::fs::write(&path, b"bytes").unwrap();
        let store = MemoryMediaStore::new();

        let id = store
            .create_from_local_file(attachment(&path, "a.png"))
            .await
            .unwrap();
        store.set_metadata(id, "k", "v").await.unwrap();

        let found = store.find_by_metadata("k", "v", 5).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, id);
        assert_eq!(found[0].parent, Some(PostId::new(3)));
        assert!(store.find_by_metadata("k", "other", 5).await.unwrap().is_empty());
        assert_eq!(
            store.url_of(id).await.unwrap().as_deref(),
            Some(format!("memory://media/{id}/a.png").as_str())
        );
        assert_eq!(store.create_count(), 1);
    }

    #[tokio::test]
    async fn rejects_non_image_names() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tmp");
        std::fs::write(&path, b"bytes").unwrap();

        let err = MemoryMediaStore::new()
            .create_from_local_file(attachment(&path, "render.php"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UpstreamRejection);
    }

    #[tokio::test]
    async fn metadata_limit_is_respected() {
        let store = MemoryMediaStore::new();
        for name in ["a.png", "b.png", "c.png"] {
            let id = store.insert_file(name, b"x");
            store.set_metadata(id, "hash", "same").await.unwrap();
        }
        assert_eq!(store.find_by_metadata("hash", "same", 1).await.unwrap().len(), 1);
        assert_eq!(store.find_by_metadata("hash", "same", 10).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn set_metadata_on_missing_record_fails() {
        let err = MemoryMediaStore::new()
            .set_metadata(MediaId::new(9), "k", "v")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }
}
