//! Error types for project loading.

use std::path::PathBuf;

/// Result type for loader operations.
pub type Result<T> = std::result::Result<T, LoadError>;

/// Errors that can occur while enumerating or loading projects.
///
/// Per-plugin failures are *not* errors at this level: they are recorded on
/// the affected node, surfaced as error-class progress events, and collected
/// into the load summary. Only conditions that sink the whole operation
/// appear here.
#[derive(thiserror::Error, Debug)]
pub enum LoadError {
    /// The load root cannot be read at all.
    ///
    /// Fatal to the operation: with no enumeration there are no totals, no
    /// skeleton, and nothing to load.
    #[error("Cannot enumerate load root {path}: {source}")]
    RootUnreadable {
        /// The unreadable root directory
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// A load was requested while another load is still running.
    ///
    /// Load requests are rejected, not queued; callers retry after the
    /// current load finishes.
    #[error("A load is already in progress")]
    LoadInProgress,

    /// A node index did not name a node of this project.
    #[error("Unknown node index {index}")]
    UnknownNode {
        /// The out-of-range index
        index: usize,
    },

    /// Declaration-level failure bubbled out of a targeted operation
    /// (e.g. refreshing a single plugin).
    #[error(transparent)]
    Declaration(#[from] bakery_core::CoreError),

    /// I/O error outside the per-item recovery path.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_unreadable_display() {
        let error = LoadError::RootUnreadable {
            path: PathBuf::from("/missing/root"),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "no such dir"),
        };
        let display = format!("{error}");
        assert!(display.contains("/missing/root"));
        assert!(display.contains("no such dir"));
    }

    #[test]
    fn busy_rejection_is_distinct() {
        let error = LoadError::LoadInProgress;
        assert!(format!("{error}").contains("already in progress"));
    }
}
