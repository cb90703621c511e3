//! Mapping between logical cache keys and persisted file names.
//!
//! Keys are percent-encoded, leaving only ASCII alphanumerics, `-`, `_` and
//! `.` verbatim. The encoding is injective and reversible, so distinct keys
//! never share a record. Encoded names longer than [`MAX_ENCODED_LEN`] are cut
//! to a readable prefix followed by `~` and the BLAKE3 digest of the full key.
//! A literal `~` is always escaped, so the marker cannot appear in a plain
//! name. Shortened names are not reversible; the record's own `key` field is
//! authoritative for them.
//!
//! A stem is never empty and never starts with `.`: the empty key maps to a
//! lone `%` (which no other key produces) and a leading dot is escaped.

use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

const FILE_NAME_SET: &AsciiSet = &NON_ALPHANUMERIC.remove(b'-').remove(b'_').remove(b'.');

/// Longest encoded name kept as-is. Leaves room for the extension and temp
/// suffix under the common 255-byte file name limit.
pub const MAX_ENCODED_LEN: usize = 160;

const PREFIX_LEN: usize = 64;
const DIGEST_MARKER: char = '~';
const EMPTY_STEM: &str = "%";

/// File name stem for a logical key.
pub fn encode(key: &str) -> String {
    if key.is_empty() {
        return EMPTY_STEM.to_string();
    }
    let mut encoded = utf8_percent_encode(key, FILE_NAME_SET).to_string();
    if encoded.starts_with('.') {
        encoded.replace_range(..1, "%2E");
    }
    if encoded.len() <= MAX_ENCODED_LEN {
        return encoded;
    }
    let digest = blake3::hash(key.as_bytes()).to_hex();
    let prefix = truncate_at_escape_boundary(&encoded, PREFIX_LEN);
    format!("{prefix}{DIGEST_MARKER}{digest}")
}

/// Logical key for a plain (non-shortened) stem.
pub fn decode(stem: &str) -> Option<String> {
    if is_shortened(stem) {
        return None;
    }
    if stem == EMPTY_STEM {
        return Some(String::new());
    }
    percent_decode_str(stem)
        .decode_utf8()
        .ok()
        .map(|key| key.into_owned())
}

pub fn is_shortened(stem: &str) -> bool {
    stem.contains(DIGEST_MARKER)
}

/// The encoded form is pure ASCII, so any byte index is a char boundary; the
/// only care needed is not to split a `%XX` escape.
fn truncate_at_escape_boundary(encoded: &str, max: usize) -> &str {
    let mut end = max.min(encoded.len());
    if let Some(pos) = encoded[..end].rfind('%') {
        if pos + 3 > end {
            end = pos;
        }
    }
    &encoded[..end]
}
