//! Last-resort retry for hosts that block non-browser clients or hotlinks.

use std::{sync::Arc, time::Duration};

use {
    aggregator_common::{MediaId, PostId},
    aggregator_config::MediaConfig,
    async_trait::async_trait,
    tracing::{debug, warn},
};

use crate::{
    error::{Error, Result},
    mime::{derive_filename, repair_filename_extension},
    normalize::{browser_url, referer},
    ports::{HttpFetcher, MediaStore, MimeSniffer, NewAttachment, TempFileStore},
    strategy::{DownloadStrategy, UNKNOWN_MIME},
};

const TEMP_PREFIX: &str = "wprss-img";

/// Request headers that make the fetch look like a desktop browser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrowserSignature {
    pub user_agent: String,
    pub accept: String,
    pub accept_language: String,
}

impl BrowserSignature {
    #[must_use]
    pub fn from_config(config: &MediaConfig) -> Self {
        Self {
            user_agent: config.user_agent.clone(),
            accept: config.accept.clone(),
            accept_language: config.accept_language.clone(),
        }
    }
}

impl Default for BrowserSignature {
    fn default() -> Self {
        Self::from_config(&MediaConfig::default())
    }
}

pub struct BrowserFallback {
    fetcher: Arc<dyn HttpFetcher>,
    store: Arc<dyn MediaStore>,
    temp: Arc<dyn TempFileStore>,
    sniffer: Arc<dyn MimeSniffer>,
    signature: BrowserSignature,
    timeout: Duration,
}

impl BrowserFallback {
    #[must_use]
    pub fn new(
        fetcher: Arc<dyn HttpFetcher>,
        store: Arc<dyn MediaStore>,
        temp: Arc<dyn TempFileStore>,
        sniffer: Arc<dyn MimeSniffer>,
        signature: BrowserSignature,
        timeout: Duration,
    ) -> Self {
        Self {
            fetcher,
            store,
            temp,
            sniffer,
            signature,
            timeout,
        }
    }
}

#[async_trait]
impl DownloadStrategy for BrowserFallback {
    fn name(&self) -> &'static str {
        "browser_fallback"
    }

    fn prepare(&self, url: &str) -> String {
        browser_url(url)
    }

    async fn attempt(&self, url: &str, post: Option<PostId>, description: &str) -> Result<MediaId> {
        let referer = referer(url)
            .ok_or_else(|| Error::fetch(format!("cannot derive referer for {url}")))?;
        let headers = [
            ("User-Agent", self.signature.user_agent.as_str()),
            ("Accept", self.signature.accept.as_str()),
            ("Accept-Language", self.signature.accept_language.as_str()),
            ("Referer", referer.as_str()),
        ];

        let response = self.fetcher.get(url, self.timeout, &headers).await?;
        if response.status != 200 || response.body.is_empty() {
            warn!(
                url,
                status = response.status,
                bytes = response.body.len(),
                "browser fetch rejected"
            );
            return Err(Error::blocked(response.status));
        }

        let file = self.temp.create(TEMP_PREFIX, &response.body).await?;
        let mime = match self.sniffer.sniff(file.path()).await {
            Ok(mime) => mime,
            Err(e) => {
                warn!(url, error = %e, "could not sniff downloaded image");
                UNKNOWN_MIME.to_string()
            },
        };
        let filename = repair_filename_extension(&derive_filename(url, &mime));
        debug!(url, mime = %mime, filename = %filename, "importing image fetched as a browser");

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
