//! Media library on the local filesystem.
//!
//! Layout under the root directory:
//!
//! ```text
//! library.json          attachment records, rewritten atomically
//! uploads/<id>-<name>   attachment files
//! ```

use std::{
    collections::{BTreeMap, HashMap},
    path::{Path, PathBuf},
};

use {
    aggregator_common::{MediaId, PostId},
    async_trait::async_trait,
    serde::{Deserialize, Serialize},
    tokio::{fs, sync::Mutex},
    tracing::{debug, info, warn},
};

use crate::{
    error::{Context, Error, Result},
    mime::has_image_extension,
    ports::{MediaRecord, MediaStore, NewAttachment},
    sniff::image_size,
};

const LIBRARY_FILE: &str = "library.json";
const UPLOADS_DIR: &str = "uploads";

#[derive(Debug, Default, Serialize, Deserialize)]
struct Library {
    next_id: u64,
    #[serde(default)]
    records: Vec<MediaRecord>,
    #[serde(default)]
    thumbnails: HashMap<PostId, MediaId>,
}

impl Library {
    fn get(&self, id: MediaId) -> Option<&MediaRecord> {
        self.records.iter().find(|r| r.id == id)
    }

    fn get_mut(&mut self, id: MediaId) -> Option<&mut MediaRecord> {
        self.records.iter_mut().find(|r| r.id == id)
    }
}

pub struct FsMediaStore {
    root: PathBuf,
    library: Mutex<Library>,
}

impl FsMediaStore {
    /// Open the library at `root`, creating it when missing.
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(root.join(UPLOADS_DIR))
            .await
            .map_err(|e| Error::io(format!("creating {}", root.display()), e))?;

        let index = root.join(LIBRARY_FILE);
        let library = if fs::try_exists(&index).await.unwrap_or(false) {
            let data = fs::read_to_string(&index)
                .await
                .map_err(|e| Error::io(format!("reading {}", index.display()), e))?;
            serde_json::from_str::<Library>(&data)
                .with_context(|| format!("failed to parse {}", index.display()))?
        } else {
            Library::default()
        };
        info!(
            root = %root.display(),
            attachments = library.records.len(),
            "media library opened"
        );

        Ok(Self {
            root,
            library: Mutex::new(library),
        })
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Mark `id` as the featured image of `post`.
    pub async fn set_thumbnail(&self, post: PostId, id: MediaId) -> Result<()> {
        let mut library = self.library.lock().await;
        if library.get(id).is_none() {
            return Err(Error::NotFound { id });
        }
        library.thumbnails.insert(post, id);
        self.save(&library).await
    }

    /// Write to a temp file and rename over the index.
    async fn save(&self, library: &Library) -> Result<()> {
        let index = self.root.join(LIBRARY_FILE);
        let tmp = index.with_extension("json.tmp");
        let data = serde_json::to_string_pretty(library)
            .map_err(|e| Error::external("serializing media library", e))?;
        fs::write(&tmp, data)
            .await
            .map_err(|e| Error::io(format!("writing {}", tmp.display()), e))?;
        fs::rename(&tmp, &index)
            .await
            .map_err(|e| Error::io(format!("replacing {}", index.display()), e))
    }
}

/// A file copied into `uploads/` that is removed on drop unless its record
/// was saved.
struct PendingUpload {
    path: Option<PathBuf>,
}

impl PendingUpload {
    fn new(path: PathBuf) -> Self {
        Self { path: Some(path) }
    }

    fn commit(mut self) {
        self.path = None;
    }
}

impl Drop for PendingUpload {
    fn drop(&mut self) {
        if let Some(path) = self.path.take()
            && let Err(e) = std::fs::remove_file(&path)
            && e.kind() != std::io::ErrorKind::NotFound
        {
            warn!(path = %path.display(), error = %e, "could not remove orphaned upload");
        }
    }
}

/// Keep only characters that are safe in a filename on every platform.
///
/// The extension is cleaned separately so a stem made only of unsafe
/// characters cannot swallow it; an empty stem becomes `image`.
fn sanitize_filename(name: &str) -> String {
    let (stem, ext) = match name.rsplit_once('.') {
        Some((stem, ext)) if !ext.is_empty() => (stem, Some(ext)),
        _ => (name, None),
    };
    let mut cleaned = sanitize_part(stem);
    if cleaned.is_empty() {
        cleaned.push_str("image");
    }
    if let Some(ext) = ext.map(sanitize_part).filter(|e| !e.is_empty()) {
        cleaned.push('.');
        cleaned.push_str(&ext);
    }
    cleaned
}

fn sanitize_part(part: &str) -> String {
    let cleaned: String = part
        .chars()
        .map(|c| match c {
            'a'..='z' | 'A'..='Z' | '0'..='9' | '.' | '-' | '_' => c,
            _ => '-',
        })
        .collect();
    cleaned.trim_matches(['.', '-']).to_string()
}

#[async_trait]
impl MediaStore for FsMediaStore {
    async fn find_by_id(&self, id: MediaId) -> Result<Option<MediaRecord>> {
        Ok(self.library.lock().await.get(id).cloned())
    }

    async fn find_by_metadata(
        &self,
        field: &str,
        value: &str,
        limit: usize,
    ) -> Result<Vec<MediaRecord>> {
        let library = self.library.lock().await;
        Ok(library
            .records
            .iter()
            .filter(|record| record.meta(field) == Some(value))
            .take(limit)
            .cloned()
            .collect())
    }

    async fn create_from_local_file(&self, attachment: NewAttachment<'_>) -> Result<MediaId> {
        let filename = sanitize_filename(attachment.filename);
        if !has_image_extension(&filename) {
            return Err(Error::upstream(format!(
                "sorry, {} is not an allowed file type",
                attachment.filename
            )));
        }

        let mut library = self.library.lock().await;
        let id = MediaId::new(library.next_id + 1);
        let stored = self.root.join(UPLOADS_DIR).join(format!("{id}-{filename}"));
        let upload = PendingUpload::new(stored.clone());
        fs::copy(attachment.path, &stored)
            .await
            .map_err(|e| Error::io(format!("copying into {}", stored.display()), e))?;

        let probe = stored.clone();
        let size = tokio::task::spawn_blocking(move || image_size(&probe))
            .await
            .map_err(|e| Error::external("probing image size", e))?;

        let previous_id = library.next_id;
        library.next_id = id.get();
        library.records.push(MediaRecord {
            id,
            filename,
            url: url::Url::from_file_path(&stored).ok().map(String::from),
            parent: attachment.parent,
            description: attachment.description.to_string(),
            size,
            metadata: BTreeMap::new(),
        });
        if let Err(e) = self.save(&library).await {
            library.records.pop();
            library.next_id = previous_id;
            return Err(e);
        }
        upload.commit();
        debug!(id = %id, path = %stored.display(), "attachment created");
        Ok(id)
    }

    async fn set_metadata(&self, id: MediaId, field: &str, value: &str) -> Result<()> {
        let mut library = self.library.lock().await;
        let record = library.get_mut(id).ok_or(Error::NotFound { id })?;
        record.metadata.insert(field.to_string(), value.to_string());
        self.save(&library).await
    }

    async fn url_of(&self, id: MediaId) -> Result<Option<String>> {
        Ok(self
            .library
            .lock()
            .await
            .get(id)
            .and_then(|r| r.url.clone()))
    }

    async fn thumbnail_of(&self, post: PostId) -> Result<Option<MediaId>> {
        Ok(self.library.lock().await.thumbnails.get(&post).copied())
    }
}
