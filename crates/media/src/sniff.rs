//! Content-based MIME detection and dimension probing.

use std::{
    io::Read,
    path::{Path, PathBuf},
};

use {
    async_trait::async_trait,
    image::{ImageFormat, ImageReader},
    tracing::debug,
};

use crate::{
    descriptor::Size,
    error::{Error, Result},
    ports::MimeSniffer,
    strategy::UNKNOWN_MIME,
};

/// Enough for every signature `image` recognizes.
const HEAD_BYTES: usize = 64;

/// [`MimeSniffer`] that reads the file's magic bytes.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageSniffer;

impl ImageSniffer {
    /// MIME type for the leading bytes of a file.
    #[must_use]
    pub fn sniff_bytes(head: &[u8]) -> &'static str {
        format_to_mime(image::guess_format(head).ok())
    }
}

#[async_trait]
impl MimeSniffer for ImageSniffer {
    async fn sniff(&self, path: &Path) -> Result<String> {
        let owned: PathBuf = path.to_path_buf();
        let head = tokio::task::spawn_blocking(move || read_head(&owned))
            .await
            .map_err(|e| Error::external("sniff task failed", e))??;
        let mime = Self::sniff_bytes(&head);
        debug!(path = %path.display(), mime, "sniffed");
        Ok(mime.to_string())
    }
}

fn read_head(path: &Path) -> Result<Vec<u8>> {
    let file = std::fs::File::open(path)
        .map_err(|e| Error::io(format!("opening {}", path.display()), e))?;
    let mut head = Vec::with_capacity(HEAD_BYTES);
    file.take(HEAD_BYTES as u64)
        .read_to_end(&mut head)
        .map_err(|e| Error::io(format!("reading {}", path.display()), e))?;
    Ok(head)
}

fn format_to_mime(format: Option<ImageFormat>) -> &'static str {
    match format {
        Some(ImageFormat::Jpeg) => "image/jpeg",
        Some(ImageFormat::Png) => "image/png",
        Some(ImageFormat::WebP) => "image/webp",
        Some(ImageFormat::Gif) => "image/gif",
        Some(ImageFormat::Bmp) => "image/bmp",
        _ => UNKNOWN_MIME,
    }
}

/// Natural dimensions of an image file, without decoding pixel data.
///
/// `None` for unreadable files and formats without a compiled-in decoder.
#[must_use]
pub fn image_size(path: &Path) -> Option<Size> {
    let (width, height) = ImageReader::open(path)
        .ok()?
        .with_guessed_format()
        .ok()?
        .into_dimensions()
        .ok()?;
    Some(Size { width, height })
}
