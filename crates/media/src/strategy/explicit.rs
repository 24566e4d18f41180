//! Fetch to a temp file, sniff the content, and name the file after what it
//! actually is.

use std::{sync::Arc, time::Duration};

use {
    aggregator_common::{MediaId, PostId},
    async_trait::async_trait,
    tracing::{debug, warn},
};

use crate::{
    error::Result,
    mime::derive_filename,
    normalize::normalize_url,
    ports::{HttpFetcher, MediaStore, MimeSniffer, NewAttachment},
    strategy::{DownloadStrategy, UNKNOWN_MIME},
};

/// Repairs URLs whose path hides the real image type (`/render.php?id=4`,
/// extensionless CDN paths) or that arrive entity-encoded from HTML.
pub struct ExplicitFetch {
    fetcher: Arc<dyn HttpFetcher>,
    store: Arc<dyn MediaStore>,
    sniffer: Arc<dyn MimeSniffer>,
    timeout: Duration,
}

impl ExplicitFetch {
    #[must_use]
    pub fn new(
        fetcher: Arc<dyn HttpFetcher>,
        store: Arc<dyn MediaStore>,
        sniffer: Arc<dyn MimeSniffer>,
        timeout: Duration,
    ) -> Self {
        Self {
            fetcher,
            store,
            sniffer,
            timeout,
        }
    }
}

#[async_trait]
impl DownloadStrategy for ExplicitFetch {
    fn name(&self) -> &'static str {
        "explicit_fetch"
    }

    fn prepare(&self, url: &str) -> String {
        normalize_url(url)
    }

    async fn attempt(&self, url: &str, post: Option<PostId>, description: &str) -> Result<MediaId> {
        let file = self.fetcher.fetch_to_temp_file(url, self.timeout).await?;

        let mime = match self.sniffer.sniff(file.path()).await {
            Ok(mime) => mime,
            Err(e) => {
                warn!(url, error = %e, "could not sniff downloaded image");
                UNKNOWN_MIME.to_string()
            },
        };
        let filename = derive_filename(url, &mime);
        debug!(url, mime = %mime, filename = %filename, "importing fetched image");

        self.store
            .create_from_local_file(NewAttachment {
                path: file.path(),
                filename: &filename,
                parent: post,
                description,
            })
            .await
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::{http::ReqwestFetcher, sniff::ImageSniffer, store::MemoryMediaStore, temp::FsTempStore},
    };

    const WEBP: &[u8] = b"RIFF\x24\x00\x00\x00WEBPVP8 ";

    fn strategy(temp: &std::path::Path, store: Arc<MemoryMediaStore>) -> ExplicitFetch {
        let fetcher = ReqwestFetcher::new(Arc::new(FsTempStore::new(temp)));
        ExplicitFetch::new(
            Arc::new(fetcher),
            store,
            Arc::new(ImageSniffer),
            Duration::from_secs(5),
        )
    }

    #[test]
    fn prepare_decodes_entities() {
        let temp = tempfile::tempdir().unwrap();
        let s = strategy(temp.path(), Arc::new(MemoryMediaStore::new()));
        assert_eq!(
            s.prepare(" https://example.com/a?x=1&amp;y=2 "),
            "https://example.com/a?x=1&y=2"
        );
    }

    #[tokio::test]
    async fn extensionless_path_gets_sniffed_extension() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/banner")
            .with_status(200)
            .with_body(WEBP)
            .create_async()
            .await;
        let temp = tempfile::tempdir().unwrap();
        let store = Arc::new(MemoryMediaStore::new());

        let id = strategy(temp.path(), Arc::clone(&store))
            .attempt(&format!("{}/banner", server.url()), None, "desc")
            .await
            .unwrap();

        let record = store.find_by_id(id).await.unwrap().unwrap();
        assert_eq!(record.filename, "banner.webp");
        assert_eq!(std::fs::read_dir(temp.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn unknown_content_defaults_to_jpg() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/photo")
            .with_status(200)
            .with_body("not an image header")
            .create_async()
            .await;
        let temp = tempfile::tempdir().unwrap();
        let store = Arc::new(MemoryMediaStore::new());

        let id = strategy(temp.path(), Arc::clone(&store))
            .attempt(&format!("{}/photo", server.url()), None, "desc")
            .await
            .unwrap();

        assert_eq!(store.find_by_id(id).await.unwrap().unwrap().filename, "photo.jpg");
    }
}
