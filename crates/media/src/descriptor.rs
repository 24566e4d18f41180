//! Source-agnostic description of an image pending import.

use std::fmt;

use {
    aggregator_common::{MediaId, PostId},
    serde::{Deserialize, Serialize},
};

use crate::{error::Result, ports::MediaStore};

/// Where in a feed an image was discovered. Informational only.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ImageSource {
    /// Found in an item's content.
    Content,
    /// Found in the feed's channel.
    Feed,
    /// RSS 2.0 `<image>` tag.
    Rss2,
    /// `<itunes:image>` tag.
    Itunes,
    /// `<media:thumbnail>` tag.
    Media,
    /// `<enclosure>` tag.
    Enclosure,
    /// Social meta tags scraped from the article.
    Social,
    /// Added by the user.
    User,
    /// Taken from the local media library.
    WordPress,
    /// Any tag this version does not know, kept verbatim.
    Other(String),
}

impl ImageSource {
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Content => "content",
            Self::Feed => "feed",
            Self::Rss2 => "rss2",
            Self::Itunes => "itunes",
            Self::Media => "media",
            Self::Enclosure => "enclosure",
            Self::Social => "social",
            Self::User => "user",
            Self::WordPress => "wordpress",
            Self::Other(raw) => raw,
        }
    }
}

impl Default for ImageSource {
    fn default() -> Self {
        Self::Other(String::new())
    }
}

impl From<&str> for ImageSource {
    fn from(raw: &str) -> Self {
        match raw {
            "content" => Self::Content,
            "feed" => Self::Feed,
            "rss2" => Self::Rss2,
            "itunes" => Self::Itunes,
            "media" => Self::Media,
            "enclosure" => Self::Enclosure,
            "social" => Self::Social,
            "user" => Self::User,
            "wordpress" => Self::WordPress,
            other => Self::Other(other.to_string()),
        }
    }
}

impl From<String> for ImageSource {
    fn from(raw: String) -> Self {
        Self::from(raw.as_str())
    }
}

impl From<ImageSource> for String {
    fn from(source: ImageSource) -> Self {
        match source {
            ImageSource::Other(raw) => raw,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for ImageSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Natural dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Size {
    pub width: u32,
    pub height: u32,
}

/// One image to materialize as a media-library attachment.
///
/// `url` may be an HTTP(S) URL or a `data:image/...;base64,...` URI. When
/// `id` is set the descriptor points at an existing attachment and `url` is
/// only informational.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImageDescriptor {
    #[serde(skip)]
    pub id: Option<MediaId>,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub source: ImageSource,
    #[serde(default)]
    pub size: Option<Size>,
    /// Alternative renditions (srcset sizes), in the order given.
    #[serde(default)]
    pub sizes: Vec<ImageDescriptor>,
}

impl ImageDescriptor {
    #[must_use]
    pub fn new(url: impl Into<String>, source: impl Into<ImageSource>) -> Self {
        Self {
            url: url.into(),
            source: source.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.size = Some(Size { width, height });
        self
    }

    #[must_use]
    pub fn with_sizes(mut self, sizes: Vec<ImageDescriptor>) -> Self {
        self.sizes = sizes;
        self
    }

    /// Descriptor for an attachment already in the library.
    ///
    /// Returns `None` when the store has no URL for `id`.
    pub async fn from_attachment(
        store: &dyn MediaStore,
        id: MediaId,
        source: impl Into<ImageSource>,
    ) -> Result<Option<Self>> {
        Ok(store.url_of(id).await?.map(|url| Self {
            id: Some(id),
            ..Self::new(url, source)
        }))
    }

    /// Descriptor for a post's featured image, if it has one.
    pub async fn from_post_thumbnail(store: &dyn MediaStore, post: PostId) -> Result<Option<Self>> {
        match store.thumbnail_of(post).await? {
            Some(id) => Self::from_attachment(store, id, ImageSource::WordPress).await,
            None => Ok(None),
        }
    }
}

/// URL of an attachment, as the admin UI looks it up.
pub async fn media_url(store: &dyn MediaStore, id: MediaId) -> Result<Option<String>> {
    store.url_of(id).await
}
