//! Capabilities the resolver consumes from its host.
//!
//! The media library, the HTTP client, temp-file creation, and MIME sniffing
//! are all injected through these traits; concrete adapters live in
//! [`crate::http`], [`crate::temp`], [`crate::sniff`], and [`crate::store`].

use std::{collections::BTreeMap, path::Path, time::Duration};

use {
    aggregator_common::{MediaId, PostId},
    async_trait::async_trait,
    serde::{Deserialize, Serialize},
    tokio::{fs::File, io::AsyncWriteExt},
};

use crate::{
    descriptor::Size,
    error::{Error, Result},
    temp::TempFile,
};

/// Metadata field holding the URL an attachment was imported from.
///
/// Future resolutions of the same URL are answered from this field, so the
/// key must never change.
pub const SOURCE_URL_KEY: &str = "wprss_source_url";

/// Metadata field holding the SHA-256 of a decoded data-URI payload.
pub const SOURCE_DATA_HASH_KEY: &str = "wprss_source_data_hash";

/// An attachment in the media library.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaRecord {
    pub id: MediaId,
    pub filename: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub parent: Option<PostId>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub size: Option<Size>,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

impl MediaRecord {
    #[must_use]
    pub fn meta(&self, field: &str) -> Option<&str> {
        self.metadata.get(field).map(String::as_str)
    }
}

/// Arguments for creating an attachment from a file on local disk.
#[derive(Debug, Clone, Copy)]
pub struct NewAttachment<'a> {
    pub path: &'a Path,
    /// Name the library should store the file under.
    pub filename: &'a str,
    pub parent: Option<PostId>,
    pub description: &'a str,
}

#[async_trait]
pub trait MediaStore: Send + Sync {
    async fn find_by_id(&self, id: MediaId) -> Result<Option<MediaRecord>>;

    /// Attachments whose metadata `field` equals `value`, at most `limit`.
    async fn find_by_metadata(
        &self,
        field: &str,
        value: &str,
        limit: usize,
    ) -> Result<Vec<MediaRecord>>;

    /// Copy the file into the library. The caller keeps ownership of `path`.
    async fn create_from_local_file(&self, attachment: NewAttachment<'_>) -> Result<MediaId>;

    async fn set_metadata(&self, id: MediaId, field: &str, value: &str) -> Result<()>;

    async fn url_of(&self, id: MediaId) -> Result<Option<String>>;

    /// Featured image of a post, for stores that track one.
    async fn thumbnail_of(&self, _post: PostId) -> Result<Option<MediaId>> {
        Ok(None)
    }
}

/// Status and body of a plain GET.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

#[async_trait]
pub trait HttpFetcher: Send + Sync {
    /// Download `url` into a temp file. Non-2xx responses are errors.
    async fn fetch_to_temp_file(&self, url: &str, timeout: Duration) -> Result<TempFile>;

    /// GET `url` with extra headers. The status is returned, not judged.
    async fn get(
        &self,
        url: &str,
        timeout: Duration,
        headers: &[(&str, &str)],
    ) -> Result<HttpResponse>;
}

#[async_trait]
pub trait TempFileStore: Send + Sync {
    /// Create an empty temp file named after `prefix`, open for writing.
    ///
    /// The file is removed when the returned guard drops, even if the
    /// handle is still open.
    async fn open(&self, prefix: &str) -> Result<(TempFile, File)>;

    /// Create a temp file named after `prefix` holding `contents`, flushed to disk.
    async fn create(&self, prefix: &str, contents: &[u8]) -> Result<TempFile> {
        let (temp, mut file) = self.open(prefix).await?;
        file.write_all(contents)
            .await
            .map_err(|e| Error::io("writing temp file", e))?;
        file.sync_all()
            .await
            .map_err(|e| Error::io("syncing temp file", e))?;
        Ok(temp)
    }
}

#[async_trait]
pub trait MimeSniffer: Send + Sync {
    /// MIME type of the file's content; `application/octet-stream` when unknown.
    async fn sniff(&self, path: &Path) -> Result<String>;
}
