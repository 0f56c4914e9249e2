use thiserror::Error;

use crate::key::Key;

/// Errors surfaced by datastore operations.
///
/// This taxonomy is closed: backends translate whatever their remote service
/// reports into one of these variants at their own boundary. Callers must not
/// assume an [`DatastoreError::UnknownBackend`] condition is recoverable.
#[derive(Debug, Error)]
pub enum DatastoreError {
    /// The requested key does not exist.
    #[error("key not found: {0}")]
    NotFound(Key),

    /// A put could not be completed (including a missing bucket when
    /// auto-creation is disabled or itself fails).
    #[error("write failed for {key}: {reason}")]
    WriteFailed { key: Key, reason: String },

    /// A delete could not be completed.
    #[error("delete failed for {key}: {reason}")]
    DeleteFailed { key: Key, reason: String },

    /// The root probe or bucket-ensure step failed during `open`.
    #[error("datastore open failed: {0}")]
    OpenFailed(String),

    /// Lock acquisition was contended, or the existence probe was ambiguous.
    #[error("repository at {0} is already locked")]
    AlreadyLocked(Key),

    /// A remote failure matching no recognized condition.
    #[error("backend error: {0}")]
    UnknownBackend(String),
}

impl DatastoreError {
    /// Returns `true` for the [`DatastoreError::NotFound`] variant.
    ///
    /// Enumeration hydration and lock release both swallow not-found
    /// conditions; this keeps those checks in one place.
    pub fn is_not_found(&self) -> bool {
        matches!(self, DatastoreError::NotFound(_))
    }
}

/// Result alias for datastore operations.
pub type DatastoreResult<T> = Result<T, DatastoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_predicate() {
        assert!(DatastoreError::NotFound(Key::new("/a")).is_not_found());
        assert!(!DatastoreError::OpenFailed("boom".into()).is_not_found());
    }

    #[test]
    fn display_includes_key() {
        let err = DatastoreError::WriteFailed {
            key: Key::new("/a/b"),
            reason: "bucket gone".into(),
        };
        assert_eq!(err.to_string(), "write failed for /a/b: bucket gone");
    }
}
