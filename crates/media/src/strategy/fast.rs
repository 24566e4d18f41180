//! One-call sideload: download as is and keep the URL's own filename.

use std::{sync::Arc, time::Duration};

use {
    aggregator_common::{MediaId, PostId},
    async_trait::async_trait,
    tracing::debug,
};

use crate::{
    error::{Error, Result},
    mime::{is_sideloadable_url, url_basename},
    ports::{HttpFetcher, MediaStore, NewAttachment},
    strategy::DownloadStrategy,
};

/// Cheapest strategy; works for well-behaved hosts that serve files with a
/// proper image extension in the path.
pub struct FastSideload {
    fetcher: Arc<dyn HttpFetcher>,
    store: Arc<dyn MediaStore>,
    timeout: Duration,
}

impl FastSideload {
    #[must_use]
    pub fn new(fetcher: Arc<dyn HttpFetcher>, store: Arc<dyn MediaStore>, timeout: Duration) -> Self {
        Self {
            fetcher,
            store,
            timeout,
        }
    }
}

#[async_trait]
impl DownloadStrategy for FastSideload {
    fn name(&self) -> &'static str {
        "fast_sideload"
    }

    async fn attempt(&self, url: &str, post: Option<PostId>, description: &str) -> Result<MediaId> {
        if !is_sideloadable_url(url) {
            return Err(Error::upstream("invalid image URL"));
        }

        let file = self.fetcher.fetch_to_temp_file(url, self.timeout).await?;
        let filename = url_basename(url);
        debug!(url, filename = %filename, "sideloading image");

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
