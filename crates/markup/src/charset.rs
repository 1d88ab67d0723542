//! Character set selection and strict decoding.
//!
//! Precedence: an explicit override, then the charset the caller declared,
//! then a byte order mark, then a `<meta>` declaration within the first
//! 1024 bytes, then UTF-8.

use crate::error::MarkupError;
use encoding_rs::{Encoding, UTF_8};
use memchr::memmem;

const PRESCAN_LIMIT: usize = 1024;

/// Where the chosen encoding came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CharsetSource {
    Override,
    Declared,
    ByteOrderMark,
    Meta,
    Default,
}

#[derive(Debug)]
pub struct Decoded {
    pub text: String,
    pub encoding: &'static Encoding,
    pub source: CharsetSource,
    /// A `<meta>` label that named no known encoding; decoding fell back to UTF-8.
    pub ignored_meta_label: Option<String>,
}

fn lookup(label: &str) -> Result<&'static Encoding, MarkupError> {
    Encoding::for_label(label.trim().as_bytes())
        .ok_or_else(|| MarkupError::UnknownCharset(label.to_string()))
}

/// Picks the encoding for `bytes` and decodes them without replacement.
///
/// Any malformed sequence fails the whole input; nothing partial is returned.
pub fn decode(
    bytes: &[u8],
    override_label: Option<&str>,
    declared_label: Option<&str>,
) -> Result<Decoded, MarkupError> {
    let mut ignored_meta_label = None;
    let (encoding, source) = if let Some(label) = override_label {
        (lookup(label)?, CharsetSource::Override)
    } else if let Some(label) = declared_label {
        (lookup(label)?, CharsetSource::Declared)
    } else if let Some((encoding, _)) = Encoding::for_bom(bytes) {
        (encoding, CharsetSource::ByteOrderMark)
    } else {
        match prescan_meta(bytes) {
            Some(label) => match Encoding::for_label(label.as_bytes()) {
                // A document that could be read to find its meta tag is not UTF-16.
                Some(encoding) if encoding.output_encoding() != encoding => {
                    (encoding.output_encoding(), CharsetSource::Meta)
                }
                Some(encoding) => (encoding, CharsetSource::Meta),
                None => {
                    ignored_meta_label = Some(label);
                    (UTF_8, CharsetSource::Default)
                }
            },
            None => (UTF_8, CharsetSource::Default),
        }
    };

    let body = match Encoding::for_bom(bytes) {
        Some((bom_encoding, bom_len)) if bom_encoding == encoding => &bytes[bom_len..],
        _ => bytes,
    };

    log::debug!("Decoding markup as {} ({:?})", encoding.name(), source);
    let text = encoding
        .decode_without_bom_handling_and_without_replacement(body)
        .ok_or_else(|| MarkupError::Decoding {
            encoding: encoding.name().to_string(),
        })?
        .into_owned();

    Ok(Decoded {
        text,
        encoding,
        source,
        ignored_meta_label,
    })
}

/// Looks for `charset=` inside a `<meta ...>` tag near the start of the input.
/// Covers both `<meta charset="x">` and the `http-equiv` content form.
fn prescan_meta(bytes: &[u8]) -> Option<String> {
    let window = &bytes[..bytes.len().min(PRESCAN_LIMIT)];
    let lowered = window.to_ascii_lowercase();
    for start in memmem::find_iter(&lowered, b"<meta") {
        let tag_end = memchr::memchr(b'>', &lowered[start..]).map_or(lowered.len(), |rel| start + rel);
        let tag = &lowered[start..tag_end];
        let Some(at) = memmem::find(tag, b"charset") else {
            continue;
        };
        let mut i = at + b"charset".len();
        while i < tag.len() && tag[i].is_ascii_whitespace() {
            i += 1;
        }
        if tag.get(i) != Some(&b'=') {
            continue;
        }
        i += 1;
        while i < tag.len() && (tag[i].is_ascii_whitespace() || tag[i] == b'"' || tag[i] == b'\'') {
            i += 1;
        }
        let value_start = i;
        while i < tag.len() && !matches!(tag[i], b'"' | b'\'' | b';' | b'/' | b'>') && !tag[i].is_ascii_whitespace() {
            i += 1;
        }
        if i > value_start {
            return Some(String::from_utf8_lossy(&tag[value_start..i]).into_owned());
        }
    }
    None
}
