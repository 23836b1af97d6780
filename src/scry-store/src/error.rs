//! Error types for store operations.

/// Result type alias for store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Errors returned by an [`ObjectStore`](crate::ObjectStore).
///
/// Callers only care about one distinction: whether the failure concerns a
/// single object (keep going) or the store as a whole (give up).
/// See [`StoreError::is_fatal`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// The requested key does not exist.
    #[error("Object not found: {0}")]
    NotFound(String),

    /// Credentials were rejected or lack permission for the bucket.
    #[error("Access denied: {0}")]
    AccessDenied(String),

    /// The store could not be reached.
    #[error("Connection failed: {0}")]
    Connection(String),

    /// A single request failed for a reason unrelated to connectivity.
    #[error("Request for '{key}' failed: {reason}")]
    Request { key: String, reason: String },

    /// The key is not acceptable to this backend.
    #[error("Invalid key '{0}'")]
    InvalidKey(String),
}

impl StoreError {
    /// Creates a new `NotFound` error.
    pub fn not_found(key: impl Into<String>) -> Self {
        Self::NotFound(key.into())
    }

    /// Creates a new `Request` error.
    pub fn request(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Request {
            key: key.into(),
            reason: reason.into(),
        }
    }

    /// Maps an I/O error raised while touching `key`.
    pub fn from_io(key: impl Into<String>, err: &std::io::Error) -> Self {
        let key = key.into();
        match err.kind() {
            std::io::ErrorKind::NotFound => Self::NotFound(key),
            std::io::ErrorKind::PermissionDenied => Self::AccessDenied(key),
            _ => Self::request(key, err.to_string()),
        }
    }

    /// Connection and credential failures abort the whole operation.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::AccessDenied(_) | Self::Connection(_))
    }

    /// Whether the failure just means the object is absent.
    pub fn is_missing(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_classification() {
        assert!(StoreError::Connection("refused".into()).is_fatal());
        assert!(StoreError::AccessDenied("bucket".into()).is_fatal());
        assert!(!StoreError::not_found("a.txt").is_fatal());
        assert!(!StoreError::request("a.txt", "timeout").is_fatal());
        assert!(StoreError::not_found("a.txt").is_missing());
    }

    #[test]
    fn test_from_io() {
        let err = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        assert_eq!(StoreError::from_io("k", &err), StoreError::not_found("k"));

        let err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "no");
        assert!(StoreError::from_io("k", &err).is_fatal());

        let err = std::io::Error::other("disk on fire");
        let mapped = StoreError::from_io("k", &err);
        assert!(mapped.to_string().contains("disk on fire"));
    }
}
