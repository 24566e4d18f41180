//! `data:<mime>;base64,<payload>` parsing.

use {
    base64::{
        Engine as _,
        alphabet,
        engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig},
    },
    sha2::{Digest, Sha256},
};

use crate::{
    error::{Error, Result},
    mime::extension_for_mime,
};

/// Accepts payloads with or without trailing `=` padding.
const LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Whether `url` is an inline image (`data:image...`), ignoring case and
/// surrounding whitespace.
#[must_use]
pub fn is_data_image_uri(url: &str) -> bool {
    url.trim()
        .get(..10)
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case("data:image"))
}

/// A decoded data URI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataUri {
    /// Lowercased MIME type, e.g. `image/png`.
    pub mime: String,
    pub bytes: Vec<u8>,
}

impl DataUri {
    /// Parse and decode. Splits on the first `;` and then the first `,`; the
    /// parameters must end in `base64`. Whitespace inside the payload is
    /// ignored.
    pub fn parse(raw: &str) -> Result<Self> {
        let raw = raw.trim();
        let rest = raw
            .get(..5)
            .filter(|scheme| scheme.eq_ignore_ascii_case("data:"))
            .map(|_| &raw[5..])
            .ok_or_else(|| Error::parse("not a data URI"))?;

        let (mime, rest) = rest
            .split_once(';')
            .ok_or_else(|| Error::parse("data URI has no ';' after the MIME type"))?;
        let (params, payload) = rest
            .split_once(',')
            .ok_or_else(|| Error::parse("data URI has no ',' before the payload"))?;

        if !ends_with_base64(params) {
            return Err(Error::parse("data URI is not base64 encoded"));
        }

        let compact: String = payload.chars().filter(|c| !c.is_ascii_whitespace()).collect();
        if compact.is_empty() {
            return Err(Error::parse("data URI payload is empty"));
        }
        let bytes = LENIENT
            .decode(compact.as_bytes())
            .map_err(|e| Error::parse(format!("invalid base64 payload: {e}")))?;

        Ok(Self {
            mime: mime.trim().to_ascii_lowercase(),
            bytes,
        })
    }

    /// Hex SHA-256 of the decoded bytes.
    #[must_use]
    pub fn sha256_hex(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(&self.bytes);
        format!("{:x}", hasher.finalize())
    }

    #[must_use]
    pub fn extension(&self) -> &'static str {
        extension_for_mime(&self.mime)
    }
}

fn ends_with_base64(params: &str) -> bool {
    params
        .rsplit(';')
        .next()
        .is_some_and(|last| last.trim().eq_ignore_ascii_case("base64"))
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, crate::ErrorKind, rstest::rstest};

    const PNG_SIGNATURE: &[u8] = &[0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a];

    #[test]
    fn parses_png_payload() {
        let uri = DataUri::parse("data:image/png;base64,iVBORw0KGgo=").unwrap();
        assert_eq!(uri.mime, "image/png");
        assert_eq!(uri.bytes, PNG_SIGNATURE);
        assert_eq!(uri.extension(), ".png");
    }

    #[test]
    fn casing_whitespace_and_padding_do_not_change_content() {
        let a = DataUri::parse("data:image/png;base64,iVBORw0KGgo=").unwrap();
        let b = DataUri::parse("  DATA:IMAGE/PNG;BASE64,iVBO Rw0K\nGgo  ").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.sha256_hex(), b.sha256_hex());
        assert_eq!(a.sha256_hex().len(), 64);
    }

    #[test]
    fn extra_parameters_before_base64_are_allowed() {
        let uri = DataUri::parse("data:image/gif;name=x.gif;base64,R0lGODlh").unwrap();
        assert_eq!(uri.mime, "image/gif");
        assert_eq!(&uri.bytes, b"GIF89a");
    }

    #[rstest]
    #[case("data:image/png,iVBORw0KGgo=")]
    #[case("data:image/png;base64")]
    #[case("data:image/png;charset=utf8,abc")]
    #[case("data:image/png;base64,")]
    #[case("data:image/png;base64,!!!!")]
    #[case("https://example.com/a.png")]
    fn malformed_input_is_a_parse_error(#[case] raw: &str) {
        assert_eq!(DataUri::parse(raw).unwrap_err().kind(), ErrorKind::Parse);
    }

    #[test]
    fn unknown_mime_defaults_to_jpg() {
        let uri = DataUri::parse("data:image/x-icon;base64,AAAB").unwrap();
        assert_eq!(uri.extension(), ".jpg");
    }

    #[rstest]
    #[case("data:image/png;base64,AAAA", true)]
    #[case("  Data:Image/jpeg;base64,AAAA", true)]
    #[case("data:text/plain;base64,AAAA", false)]
    #[case("https://example.com/data:image", false)]
    #[case("data:", false)]
    fn detects_inline_images(#[case] url: &str, #[case] expected: bool) {
        assert_eq!(is_data_image_uri(url), expected);
    }
}
