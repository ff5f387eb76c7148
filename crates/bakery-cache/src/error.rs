//! Error types for cache operations.

use std::path::PathBuf;

/// Result type for cache operations.
pub type Result<T> = std::result::Result<T, CacheError>;

/// Errors that can occur during cache operations.
///
/// Cache errors are never fatal to a load: the loader treats an unusable
/// cache as "caching disabled" and keeps going with fresh parses.
#[derive(thiserror::Error, Debug)]
pub enum CacheError {
    /// The cache directory cannot be created or read.
    ///
    /// Surfaced once at open time; the session then runs with caching
    /// disabled rather than aborting.
    #[error("Cache directory unusable: {path}: {reason}")]
    DirectoryUnusable {
        /// The cache directory
        path: PathBuf,
        /// Why it cannot be used
        reason: String,
    },

    /// I/O error occurred during entry file operations.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error for an entry file.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directory_unusable_display() {
        let error = CacheError::DirectoryUnusable {
            path: PathBuf::from("/no/such/cache"),
            reason: "permission denied".to_string(),
        };
        let display = format!("{error}");
        assert!(display.contains("/no/such/cache"));
        assert!(display.contains("permission denied"));
    }

    #[test]
    fn io_error_conversion() {
        let io_error = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let error: CacheError = io_error.into();
        assert!(format!("{error}").contains("IO error"));
    }
}
