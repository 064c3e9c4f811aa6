//! Content-addressed post identity.
//!
//! A post id is the SHA-256 of its text followed by the *raw* timestamp string
//! exactly as it appeared in the source. Two spellings of the same instant
//! (e.g. `2022-09-29 23:41:16+00:00` vs `2022-09-29T23:41:16Z`) therefore yield
//! two different ids.

use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Stable identifier of a post node.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PostId(String);

impl PostId {
    /// Wrap an id that was already derived (e.g. read back from the graph).
    pub fn from_existing(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for PostId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Derive the id of a post from its text and raw source timestamp.
///
/// Missing text hashes as the empty string.
pub fn derive_post_id(text: Option<&str>, raw_timestamp: &str) -> PostId {
    let mut hasher = Sha256::new();
    hasher.update(text.unwrap_or("").as_bytes());
    hasher.update(raw_timestamp.as_bytes());
    PostId(hex::encode(hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deterministic() {
        let a = derive_post_id(Some("Great $X #bull"), "2022-09-29 23:41:16+00:00");
        let b = derive_post_id(Some("Great $X #bull"), "2022-09-29 23:41:16+00:00");
        assert_eq!(a, b);
        assert_eq!(a.as_str().len(), 64);
    }

    #[test]
    fn test_known_digest() {
        // sha256("abc")
        let id = derive_post_id(Some("ab"), "c");
        assert_eq!(
            id.as_str(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_missing_text_is_empty_string() {
        assert_eq!(derive_post_id(None, "2022-01-01"), derive_post_id(Some(""), "2022-01-01"));
    }

    #[test]
    fn test_raw_timestamp_format_matters() {
        let a = derive_post_id(Some("same"), "2022-09-29 23:41:16+00:00");
        let b = derive_post_id(Some("same"), "2022-09-29T23:41:16Z");
        assert_ne!(a, b);
    }
}
