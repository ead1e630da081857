//! Storage key derivation.
//!
//! Every object belonging to a book lives under the `book/{book_id}/`
//! prefix, split into role sub-prefixes: `uploads/` for source audio as
//! received, `media/` for encoded output, and `covers/` for artwork.
//! Keys are derived once at ingest time and stored verbatim; they are
//! never recomputed from mutable metadata.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Fallback display name for files whose name sanitizes to nothing.
pub const UNNAMED_AUDIO: &str = "unnamed_audio";

/// Role sub-prefix within a book's key namespace.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyPrefix {
    /// Source audio as uploaded, before encoding.
    Uploads,
    /// Encoded output ready for delivery.
    Media,
    /// Cover artwork.
    Covers,
}

impl KeyPrefix {
    /// Get the string representation used in keys.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Uploads => "uploads",
            Self::Media => "media",
            Self::Covers => "covers",
        }
    }

    /// Parse from string.
    pub fn parse(s: &str) -> crate::Result<Self> {
        match s {
            "uploads" => Ok(Self::Uploads),
            "media" => Ok(Self::Media),
            "covers" => Ok(Self::Covers),
            _ => Err(crate::Error::InvalidKey(format!("unknown prefix: {s}"))),
        }
    }
}

impl fmt::Display for KeyPrefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Derive the storage key for a file belonging to a book.
///
/// Whitespace in the filename is mapped to underscores so the resulting
/// key is whitespace-free. The uploader's identity is deliberately not
/// part of the key: chapters survive account changes, and a whole book
/// can be removed with a single prefix delete.
pub fn generate_key(book_id: &str, prefix: KeyPrefix, filename: &str) -> String {
    let safe_name: String = filename
        .chars()
        .map(|c| if c.is_whitespace() { '_' } else { c })
        .collect();
    format!("book/{book_id}/{}/{safe_name}", prefix.as_str())
}

/// Prefix under which every key for a book lives.
pub fn book_prefix(book_id: &str) -> String {
    format!("book/{book_id}/")
}

/// Characters never allowed in display filenames.
const FORBIDDEN_CHARS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// Sanitize a client-supplied filename for display and storage as the
/// chapter's `file_name`.
///
/// This is for display names only; it is not the key transform.
/// Forbidden filesystem characters become underscores, whitespace runs
/// collapse to a single space, underscore runs collapse to a single
/// underscore, and leading/trailing dots and spaces are trimmed. A name
/// that sanitizes to nothing becomes [`UNNAMED_AUDIO`].
pub fn sanitize_filename(raw: &str) -> String {
    let replaced: String = raw
        .chars()
        .map(|c| if FORBIDDEN_CHARS.contains(&c) { '_' } else { c })
        .collect();

    let mut out = String::with_capacity(replaced.len());
    let mut prev_space = false;
    let mut prev_underscore = false;
    for c in replaced.chars() {
        if c.is_whitespace() {
            if !prev_space {
                out.push(' ');
            }
            prev_space = true;
            prev_underscore = false;
        } else if c == '_' {
            if !prev_underscore {
                out.push('_');
            }
            prev_underscore = true;
            prev_space = false;
        } else {
            out.push(c);
            prev_space = false;
            prev_underscore = false;
        }
    }

    let trimmed = out.trim_matches(|c| c == '.' || c == ' ');
    if trimmed.is_empty() {
        UNNAMED_AUDIO.to_string()
    } else {
        trimmed.to_string()
    }
}
