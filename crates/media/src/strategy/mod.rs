//! The download chain.
//!
//! Each URL-based strategy is one [`DownloadStrategy`]; the resolver runs
//! them in order and stops at the first success. The data-URI importer is
//! not part of the chain and lives in [`inline`].

pub mod browser;
pub mod explicit;
pub mod fast;
pub mod inline;

use {
    aggregator_common::{MediaId, PostId},
    async_trait::async_trait,
};

use crate::error::Result;

pub use {
    browser::{BrowserFallback, BrowserSignature},
    explicit::ExplicitFetch,
    fast::FastSideload,
    inline::Base64Import,
};

/// MIME type assumed when sniffing fails.
pub(crate) const UNKNOWN_MIME: &str = "application/octet-stream";

#[async_trait]
pub trait DownloadStrategy: Send + Sync {
    /// Short stable name, used in logs, metrics, and failure reports.
    fn name(&self) -> &'static str;

    /// Rewrite the working URL before this attempt. The rewritten URL is
    /// carried forward to later strategies and used as the dedup marker.
    fn prepare(&self, url: &str) -> String {
        url.to_string()
    }

    /// Try to create an attachment from `url`.
    async fn attempt(&self, url: &str, post: Option<PostId>, description: &str) -> Result<MediaId>;
}

/// Description attached to every imported image.
#[must_use]
pub fn attachment_description(post: Option<PostId>) -> String {
    match post {
        Some(post) => format!("[Aggregator] Downloaded image for imported item #{post}"),
        None => "Imported by WP RSS Aggregator".to_string(),
    }
}
