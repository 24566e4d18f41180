//! URL cleanup for image sources scraped out of HTML.

use crate::mime::repair_corrupted_extension;

/// Decode HTML character references: the common named entities plus decimal
/// and hexadecimal numeric references. Unknown entities are left untouched.
#[must_use]
pub fn decode_html_entities(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(start) = rest.find('&') {
        out.push_str(&rest[..start]);
        let tail = &rest[start..];
        match decode_entity(tail) {
            Some((ch, consumed)) => {
                out.push(ch);
                rest = &tail[consumed..];
            },
            None => {
                out.push('&');
                rest = &tail[1..];
            },
        }
    }
    out.push_str(rest);
    out
}

/// Decode one reference at the start of `s` (which begins with `&`).
/// Returns the character and the number of bytes consumed.
fn decode_entity(s: &str) -> Option<(char, usize)> {
    let end = s[1..].find(';')? + 1;
    let body = &s[1..end];
    if body.is_empty() || body.len() > 10 {
        return None;
    }

    let ch = if let Some(num) = body.strip_prefix('#') {
        let code = match num.strip_prefix(['x', 'X']) {
            Some(hex) => u32::from_str_radix(hex, 16).ok()?,
            None => num.parse().ok()?,
        };
        char::from_u32(code)?
    } else {
        match body {
            "amp" => '&',
            "lt" => '<',
            "gt" => '>',
            "quot" => '"',
            "apos" => '\'',
            "nbsp" => '\u{a0}',
            _ => return None,
        }
    };
    Some((ch, end + 1))
}

/// Decode entities and trim surrounding whitespace.
#[must_use]
pub fn normalize_url(raw: &str) -> String {
    decode_html_entities(raw).trim().to_string()
}

/// Cleanup applied before the browser-like retry: entity decoding, JSON
/// escaped slashes, and corrupted `.jpgx`-style extensions.
#[must_use]
pub fn browser_url(raw: &str) -> String {
    let decoded = normalize_url(raw).replace("\\/", "/");
    repair_corrupted_extension(&decoded)
}

/// `scheme://host` of a URL, used as the Referer for hotlink-protected hosts.
#[must_use]
pub fn referer(raw: &str) -> Option<String> {
    let parsed = url::Url::parse(raw).ok()?;
    let host = parsed.host_str()?;
    Some(format!("{}://{host}", parsed.scheme()))
}
