//! Blake3 content fingerprints for cache validation.
//!
//! Fingerprints are stored in the format `"blake3:<hex>"` for easy
//! identification and future algorithm upgrades. A cache entry is adopted
//! only when its fingerprint matches the fingerprint of the file's current
//! bytes, so timestamp-preserving edits still invalidate correctly.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Content identity of a plugin file, used to validate cache entries.
///
/// # Examples
///
/// ```
/// use bakery_cache::Fingerprint;
///
/// let fp = Fingerprint::of_bytes(b"[Main]\nTitle=A\n");
/// assert!(fp.as_str().starts_with("blake3:"));
/// assert_eq!(fp, Fingerprint::of_bytes(b"[Main]\nTitle=A\n"));
/// assert_ne!(fp, Fingerprint::of_bytes(b"[Main]\nTitle=B\n"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Calculates the fingerprint of the given bytes.
    ///
    /// Blake3 is fast enough that hashing whole declaration files inside
    /// loader workers is cheaper than a parse, which is the property the
    /// cache depends on.
    #[must_use]
    pub fn of_bytes(data: &[u8]) -> Self {
        let hash = blake3::hash(data);
        Self(format!("blake3:{}", hash.to_hex()))
    }

    /// Returns the fingerprint as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Validates fingerprint format without any content check.
    ///
    /// Accepts `"blake3:"` followed by exactly 64 lowercase hex characters.
    /// Used to reject malformed cache entries early.
    #[must_use]
    pub fn is_valid_format(value: &str) -> bool {
        value.strip_prefix("blake3:").is_some_and(|hex| {
            hex.len() == 64 && hex.chars().all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c))
        })
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fingerprint_is_deterministic() {
        let a = Fingerprint::of_bytes(b"same content");
        let b = Fingerprint::of_bytes(b"same content");
        assert_eq!(a, b);
    }

    #[test]
    fn fingerprint_distinguishes_content() {
        assert_ne!(Fingerprint::of_bytes(b"a"), Fingerprint::of_bytes(b"b"));
    }

    #[test]
    fn fingerprint_format() {
        let fp = Fingerprint::of_bytes(b"x");
        assert!(Fingerprint::is_valid_format(fp.as_str()));
        assert_eq!(fp.as_str().len(), 71); // "blake3:" (7) + hex (64)
    }

    #[test]
    fn invalid_formats_rejected() {
        assert!(!Fingerprint::is_valid_format("md5:abc"));
        assert!(!Fingerprint::is_valid_format("blake3:short"));
        assert!(!Fingerprint::is_valid_format(&format!(
            "blake3:{}",
            "G".repeat(64)
        )));
        let upper = format!("blake3:{}", "A".repeat(64));
        assert!(!Fingerprint::is_valid_format(&upper));
    }

    #[test]
    fn empty_input_has_valid_fingerprint() {
        let fp = Fingerprint::of_bytes(b"");
        assert!(Fingerprint::is_valid_format(fp.as_str()));
    }

    #[test]
    fn serde_is_transparent() {
        let fp = Fingerprint::of_bytes(b"x");
        let json = serde_json::to_string(&fp).unwrap();
        assert_eq!(json, format!("\"{}\"", fp.as_str()));
        let back: Fingerprint = serde_json::from_str(&json).unwrap();
        assert_eq!(back, fp);
    }
}
