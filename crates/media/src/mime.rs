//! Filename and extension repair.
//!
//! The media library refuses files without an image extension, so names
//! taken from URLs are fixed up against the sniffed MIME type before import.

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "bmp", "webp"];

/// Extensions the fast sideload path accepts in a URL.
const SIDELOAD_EXTENSIONS: &[&str] = &["jpg", "jpeg", "jpe", "gif", "png", "webp"];

/// Extensions some CDNs corrupt by appending an `x`.
const CORRUPTED_EXTENSIONS: &[&str] = &[".jpgx", ".jpegx", ".pngx"];

/// File extension (with leading dot) for a MIME type, `.jpg` when unknown.
#[must_use]
pub fn extension_for_mime(mime: &str) -> &'static str {
    let essence = mime.split(';').next().unwrap_or_default().trim();
    match essence.to_ascii_lowercase().as_str() {
        "image/jpeg" | "image/jpg" | "image/pjpeg" => ".jpg",
        "image/png" => ".png",
        "image/gif" => ".gif",
        "image/bmp" | "image/x-ms-bmp" => ".bmp",
        "image/webp" => ".webp",
        _ => ".jpg",
    }
}

fn extension_of(name: &str) -> Option<&str> {
    name.rsplit_once('.').map(|(_, ext)| ext)
}

fn has_extension_in(name: &str, allowed: &[&str]) -> bool {
    extension_of(name).is_some_and(|ext| allowed.iter().any(|a| ext.eq_ignore_ascii_case(a)))
}

/// Whether `name` ends in a recognized image extension, ignoring case.
#[must_use]
pub fn has_image_extension(name: &str) -> bool {
    has_extension_in(name, IMAGE_EXTENSIONS)
}

/// Last path segment of a URL, without query or fragment. Percent-encoding
/// is kept as is.
#[must_use]
pub fn url_basename(raw: &str) -> String {
    if let Ok(parsed) = url::Url::parse(raw) {
        let last = parsed
            .path_segments()
            .and_then(|mut segments| segments.next_back())
            .unwrap_or_default();
        return last.to_string();
    }
    let path = raw.split(['?', '#']).next().unwrap_or_default();
    path.rsplit('/').next().unwrap_or_default().to_string()
}

/// Filename for an image downloaded from `url` whose content sniffed as `mime`.
///
/// Uses the URL's basename, `image` when that is empty, and appends the
/// extension for `mime` when the name lacks a recognized image extension.
#[must_use]
pub fn derive_filename(url: &str, mime: &str) -> String {
    let mut name = url_basename(url);
    if name.is_empty() {
        name.push_str("image");
    }
    if !has_image_extension(&name) {
        name.push_str(extension_for_mime(mime));
    }
    name
}

/// Whether the URL's path ends in an extension the fast path can sideload.
#[must_use]
pub fn is_sideloadable_url(raw: &str) -> bool {
    has_extension_in(&url_basename(raw), SIDELOAD_EXTENSIONS)
}

/// Strip the stray `x` from `.jpgx`, `.jpegx` and `.pngx` at the end of a
/// filename.
#[must_use]
pub fn repair_filename_extension(name: &str) -> String {
    let lower = name.to_ascii_lowercase();
    if CORRUPTED_EXTENSIONS.iter().any(|broken| lower.ends_with(broken)) {
        return name[..name.len() - 1].to_string();
    }
    name.to_string()
}

/// Repair a corrupted extension in a URL's path, when it ends the path.
#[must_use]
pub fn repair_corrupted_extension(raw: &str) -> String {
    match url::Url::parse(raw) {
        Ok(mut parsed) => {
            let path = parsed.path().to_string();
            let repaired = repair_filename_extension(&path);
            if repaired == path {
                return raw.to_string();
            }
            parsed.set_path(&repaired);
            parsed.to_string()
        },
        Err(_) => {
            let end = raw.find(['?', '#']).unwrap_or(raw.len());
            let (path, rest) = raw.split_at(end);
            format!("{}{rest}", repair_filename_extension(path))
        },
    }
}

#[cfg(test)]
mod tests {
    use {super::*, rstest::rstest};

    #[rstest]
    #[case("image/jpeg", ".jpg")]
    #[case("image/png", ".png")]
    #[case("IMAGE/GIF", ".gif")]
    #[case("image/bmp", ".bmp")]
    #[case("image/webp; charset=binary", ".webp")]
    #[case("application/octet-stream", ".jpg")]
    #[case("", ".jpg")]
    fn maps_mime_to_extension(#[case] mime: &str, #[case] ext: &str) {
        assert_eq!(extension_for_mime(mime), ext);
    }

    #[rstest]
    #[case("photo.JPG", true)]
    #[case("photo.jpeg", true)]
    #[case("photo.webp", true)]
    #[case("photo.svg", false)]
    #[case("photo", false)]
    #[case("photo.php", false)]
    fn detects_image_extension(#[case] name: &str, #[case] expected: bool) {
        assert_eq!(has_image_extension(name), expected);
    }

    #[rstest]
    #[case("https://cdn.example.com/img/photo.png?w=300#top", "photo.png")]
    #[case("https://cdn.example.com/img/my%20photo.jpg", "my%20photo.jpg")]
    #[case("https://cdn.example.com/", "")]
    #[case("not a url/pic.gif?x=1", "pic.gif")]
    fn takes_basename(#[case] url: &str, #[case] expected: &str) {
        assert_eq!(url_basename(url), expected);
    }

    #[rstest]
    #[case("https://example.com/render.php?id=9", "image/png", "render.php.png")]
    #[case("https://example.com/photo.jpeg", "image/png", "photo.jpeg")]
    #[case("https://example.com/", "image/gif", "image.gif")]
    #[case("https://example.com/pic", "application/octet-stream", "pic.jpg")]
    fn derives_filename(#[case] url: &str, #[case] mime: &str, #[case] expected: &str) {
        assert_eq!(derive_filename(url, mime), expected);
    }

    #[rstest]
    #[case("https://example.com/a.jpe", true)]
    #[case("https://example.com/a.PNG?x=1", true)]
    #[case("https://example.com/a.bmp", false)]
    #[case("https://example.com/image?id=3", false)]
    fn sideloadable_urls(#[case] url: &str, #[case] expected: bool) {
        assert_eq!(is_sideloadable_url(url), expected);
    }

    #[rstest]
    #[case("photo.jpgx", "photo.jpg")]
    #[case("photo.JPEGX", "photo.JPEG")]
    #[case("photo.pngx", "photo.png")]
    #[case("photo.gifx", "photo.gifx")]
    #[case("photo.jpg", "photo.jpg")]
    fn repairs_filename(#[case] name: &str, #[case] expected: &str) {
        assert_eq!(repair_filename_extension(name), expected);
    }

    #[rstest]
    #[case("https://cdn.example.com/a.jpgx", "https://cdn.example.com/a.jpg")]
    #[case("https://cdn.example.com/a.pngx?w=1", "https://cdn.example.com/a.png?w=1")]
    #[case("https://cdn.example.com/a.jpgx/b", "https://cdn.example.com/a.jpgx/b")]
    #[case("https://cdn.example.com/a.jpg?f=.pngx", "https://cdn.example.com/a.jpg?f=.pngx")]
    fn repairs_url_extension(#[case] url: &str, #[case] expected: &str) {
        assert_eq!(repair_corrupted_extension(url), expected);
    }
}
