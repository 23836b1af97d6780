//! Error types for search and key resolution.

use std::path::PathBuf;

use scry_store::StoreError;

use crate::record::Source;

/// Result type alias for search operations.
pub type SearchResult<T> = std::result::Result<T, SearchError>;

/// Errors that can occur during search, resolution and key actions.
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    /// A local path escapes the sandbox root.
    #[error("Path '{path}' is outside the allowed root '{}'", .root.display())]
    OutOfSandbox { path: String, root: PathBuf },

    /// A source could not be reached at all.
    #[error("{origin} source unavailable: {reason}")]
    SourceUnavailable { origin: Source, reason: String },

    /// A single object or file could not be fetched or decoded.
    #[error("Cannot read '{key}': {reason}")]
    ObjectUnreadable { key: String, reason: String },

    /// The search text is not a valid regular expression.
    #[error("Invalid search pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    /// Every resolution strategy came back empty.
    #[error("Object not found: {0}")]
    NotFound(String),

    /// The key only resolved to guesses that need a caller's confirmation.
    #[error(
        "'{requested}' does not exist; closest matches: {}",
        .suggestions.join(", ")
    )]
    Unconfirmed {
        requested: String,
        suggestions: Vec<String>,
    },

    /// The target key of a rename already exists.
    #[error("Target already exists: {0}")]
    AlreadyExists(String),

    /// A new object name was rejected.
    #[error("Invalid file name '{name}': {reason}")]
    InvalidName { name: String, reason: String },

    /// A background search task panicked or was aborted.
    #[error("Search task failed: {0}")]
    TaskFailed(String),

    /// Store call failed outside of a scan.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// I/O error during local operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl SearchError {
    /// Creates a new `OutOfSandbox` error.
    pub fn out_of_sandbox(path: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        Self::OutOfSandbox {
            path: path.into(),
            root: root.into(),
        }
    }

    /// Creates a new `SourceUnavailable` error.
    pub fn source_unavailable(origin: Source, reason: impl Into<String>) -> Self {
        Self::SourceUnavailable {
            origin,
            reason: reason.into(),
        }
    }

    /// Creates a new `ObjectUnreadable` error.
    pub fn unreadable(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ObjectUnreadable {
            key: key.into(),
            reason: reason.into(),
        }
    }

    /// Creates a new `InvalidPattern` error.
    pub fn invalid_pattern(pattern: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidPattern {
            pattern: pattern.into(),
            reason: reason.into(),
        }
    }

    /// Creates a new `InvalidName` error.
    pub fn invalid_name(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidName {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Errors that abort a whole search instead of one source's share of it.
    pub fn is_operation_level(&self) -> bool {
        matches!(
            self,
            Self::OutOfSandbox { .. } | Self::InvalidPattern { .. } | Self::TaskFailed(_)
        )
    }

    /// Permission-class errors, reported to users as "access denied".
    pub fn is_permission(&self) -> bool {
        match self {
            Self::OutOfSandbox { .. } => true,
            Self::Store(err) => matches!(err, StoreError::AccessDenied(_)),
            _ => false,
        }
    }
}
