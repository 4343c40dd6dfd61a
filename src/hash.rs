//! SHA-256 content fingerprints for deduplication and change detection.

use sha2::{Digest, Sha256};

use crate::models::Category;

/// Lowercase hex SHA-256 of `text`.
pub fn fingerprint(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Dedup key of a memory entry: the text and its category.
pub fn entry_fingerprint(text: &str, category: Category) -> String {
    fingerprint(&format!("{}\n{}", text, category.as_str()))
}
