//! Error types for plugin declaration handling.

use std::path::PathBuf;

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;

/// Errors that can occur while parsing or rewriting plugin declarations.
#[derive(thiserror::Error, Debug)]
pub enum CoreError {
    /// The declaration has no `[Main]` section or is otherwise malformed.
    ///
    /// A plugin without a `[Main]` section cannot seed a selection state or
    /// carry a title, so the file is rejected as a whole. The loader records
    /// this per node and keeps loading siblings.
    #[error("Invalid declaration in {path}: {reason}")]
    InvalidDeclaration {
        /// Path of the offending declaration file
        path: PathBuf,
        /// Why the declaration was rejected
        reason: String,
    },

    /// A link declaration is missing its `Link` target key.
    #[error("Link declaration {path} has no Link key")]
    MissingLinkTarget {
        /// Path of the link file
        path: PathBuf,
    },

    /// I/O error occurred during file operations.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CoreError {
    /// Returns true if this error is recoverable.
    ///
    /// Recoverable errors are content problems in a single declaration file;
    /// I/O failures are treated as environmental.
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::InvalidDeclaration { .. } | Self::MissingLinkTarget { .. }
        )
    }
}
