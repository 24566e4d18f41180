//! Scoped temporary files.
//!
//! Every download lands in a [`TempFile`], which removes itself when dropped.
//! Strategies never delete paths by hand, so early returns and `?` cannot
//! leave files behind.

use std::path::{Path, PathBuf};

use {
    async_trait::async_trait,
    tempfile::{NamedTempFile, TempPath},
    tokio::fs::File,
    tracing::debug,
};

use crate::{
    error::{Error, Result},
    ports::TempFileStore,
};

/// A file on disk that is deleted when this value goes out of scope.
#[derive(Debug)]
pub struct TempFile {
    path: TempPath,
}

impl TempFile {
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// [`TempFileStore`] backed by a directory on the local filesystem.
#[derive(Debug, Clone)]
pub struct FsTempStore {
    dir: PathBuf,
}

impl FsTempStore {
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Use the directory from config, or the system temp dir.
    #[must_use]
    pub fn from_config(config: &aggregator_config::MediaConfig) -> Self {
        Self::new(config.temp_dir.clone().unwrap_or_else(std::env::temp_dir))
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

#[async_trait]
impl TempFileStore for FsTempStore {
    async fn open(&self, prefix: &str) -> Result<(TempFile, File)> {
        let dir = self.dir.clone();
        let prefix = prefix.to_string();

        let (file, path) = tokio::task::spawn_blocking(move || {
            tempfile::Builder::new()
                .prefix(&prefix)
                .tempfile_in(&dir)
                .map(NamedTempFile::into_parts)
                .map_err(|e| Error::io(format!("creating temp file in {}", dir.display()), e))
        })
        .await
        .map_err(|e| Error::external("temp file task failed", e))??;

        debug!(path = %path.display(), "temp file opened");
        Ok((TempFile { path }, File::from_std(file)))
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    fn entries(dir: &Path) -> usize {
        std::fs::read_dir(dir).unwrap().count()
    }

    #[tokio::test]
    async fn created_file_holds_contents_until_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsTempStore::new(dir.path());

        let file = store.create("wprss-test", b"payload").await.unwrap();
        assert!(
            file.path()
                .file_name()
                .unwrap()
                .to_string_lossy()
                .starts_with("wprss-test")
        );
        assert_eq!(std::fs::read(file.path()).unwrap(), b"payload");
        assert_eq!(entries(dir.path()), 1);

        drop(file);
        assert_eq!(entries(dir.path()), 0);
    }

    #[tokio::test]
    async fn missing_directory_is_an_io_error() {
        let store = FsTempStore::new("/nonexistent/aggregator-temp");
        let err = store.create("x", b"1").await.unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Io);
    }

    #[tokio::test]
    async fn open_file_is_removed_with_its_guard() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsTempStore::new(dir.path());

        let (guard, mut file) = store.open("wprss-stream").await.unwrap();
        tokio::io::AsyncWriteExt::write_all(&mut file, b"chunk")
            .await
            .unwrap();
        tokio::io::AsyncWriteExt::flush(&mut file).await.unwrap();
        assert_eq!(std::fs::read(guard.path()).unwrap(), b"chunk");

        drop(guard);
        assert_eq!(entries(dir.path()), 0);
        drop(file);
    }
}
