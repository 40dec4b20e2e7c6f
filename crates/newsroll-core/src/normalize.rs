//! Content normalization for duplicate detection.
//!
//! Two items carry the same content when their normalized text is equal:
//! markup tags stripped, surrounding whitespace trimmed, lower-cased.
//! Content that is empty after trimming normalizes to `None` and never
//! matches anything.

use std::sync::LazyLock;

use regex::Regex;
use sha2::{Digest, Sha256};

static RE_MARKUP: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<!--.*?-->|<[^>]*>").expect("markup pattern is valid")
});

/// Remove HTML/XML tags and comments, keeping the text between them.
pub fn strip_tags(text: &str) -> String {
    RE_MARKUP.replace_all(text, "").into_owned()
}

/// Normalize content for comparison. Returns `None` when nothing is left.
pub fn normalize_content(text: Option<&str>) -> Option<String> {
    let stripped = strip_tags(text?);
    let trimmed = stripped.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_lowercase())
    }
}

/// SHA-256 of normalized content, used as the indexed lookup key.
pub fn content_hash(normalized: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(normalized.as_bytes());
    format!("{:x}", hasher.finalize())
}
