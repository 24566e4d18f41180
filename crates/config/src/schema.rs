/// Config schema types for the media pipeline and its host binary.
use std::{path::PathBuf, time::Duration};

use serde::{Deserialize, Serialize};

/// Browser signature sent by the anti-bot download fallback.
pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 Chrome/120.0.0.0 Safari/537.36";
pub const DEFAULT_ACCEPT: &str = "image/avif,image/webp,image/apng,image/*,*/*;q=0.8";
pub const DEFAULT_ACCEPT_LANGUAGE: &str = "en-US,en;q=0.9";

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregatorConfig {
    pub media: MediaConfig,
    pub metrics: MetricsConfig,
}

/// Image download and media-library settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MediaConfig {
    /// Timeout for plain fetch-to-file downloads. Defaults to 15.
    pub sideload_timeout_secs: u64,
    /// Timeout for the browser-signature fallback request. Defaults to 20.
    pub browser_timeout_secs: u64,
    pub user_agent: String,
    pub accept: String,
    pub accept_language: String,
    /// Serialize concurrent resolutions that share a source URL or content
    /// hash, so the dedup check and the attachment write happen atomically.
    pub serialize_dedup_keys: bool,
    /// Directory for download temp files. `None` uses the system temp dir.
    pub temp_dir: Option<PathBuf>,
    /// Root of the filesystem media library. `None` uses `<data_dir>/media`.
    pub library_dir: Option<PathBuf>,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            sideload_timeout_secs: 15,
            browser_timeout_secs: 20,
            user_agent: DEFAULT_USER_AGENT.into(),
            accept: DEFAULT_ACCEPT.into(),
            accept_language: DEFAULT_ACCEPT_LANGUAGE.into(),
            serialize_dedup_keys: true,
            temp_dir: None,
            library_dir: None,
        }
    }
}

impl MediaConfig {
    #[must_use]
    pub fn sideload_timeout(&self) -> Duration {
        Duration::from_secs(self.sideload_timeout_secs)
    }

    #[must_use]
    pub fn browser_timeout(&self) -> Duration {
        Duration::from_secs(self.browser_timeout_secs)
    }
}

/// Metrics recorder settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Whether metrics collection is enabled. Defaults to false.
    pub enabled: bool,
    /// Labels attached to every exported metric.
    pub global_labels: Vec<(String, String)>,
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_uses_defaults() {
        let cfg: AggregatorConfig = toml::from_str("").unwrap();
        assert_eq!(cfg.media, MediaConfig::default());
        assert_eq!(cfg.media.sideload_timeout(), Duration::from_secs(15));
        assert_eq!(cfg.media.browser_timeout(), Duration::from_secs(20));
        assert!(cfg.media.serialize_dedup_keys);
        assert!(!cfg.metrics.enabled);
    }

    #[test]
    fn partial_media_section_keeps_other_defaults() {
        let cfg: AggregatorConfig = toml::from_str(
            r#"
            [media]
            browser_timeout_secs = 45
            serialize_dedup_keys = false
            "#,
        )
        .unwrap();
        assert_eq!(cfg.media.browser_timeout_secs, 45);
        assert!(!cfg.media.serialize_dedup_keys);
        assert_eq!(cfg.media.sideload_timeout_secs, 15);
        assert_eq!(cfg.media.user_agent, DEFAULT_USER_AGENT);
    }
}
