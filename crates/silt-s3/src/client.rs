//! The narrow client interface over the remote object store.
//!
//! The adapter depends only on this trait, never on a concrete SDK, so a
//! fake in-memory client can stand in for the remote service in tests. The
//! trait carries the five baseline operations of an S3-compatible store, the
//! bucket-create call, and a conditional put used by the repo lock.
//!
//! Implementations normalize their SDK's error shapes into the closed
//! [`ClientError`] condition set at this boundary; nothing above it ever
//! inspects backend-specific codes or HTTP statuses.

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

/// One page of a listing, plus whether more results exist beyond it.
#[derive(Clone, Debug, Default)]
pub struct ObjectPage {
    /// Physical object names in this page, in lexicographic order.
    pub names: Vec<String>,
    /// `true` when the listing was cut short by the page-size limit.
    pub truncated: bool,
}

/// Remote conditions recognized by the adapter.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ClientError {
    /// The named object does not exist.
    #[error("object not found")]
    NotFound,

    /// The bucket itself does not exist.
    #[error("bucket does not exist")]
    BucketMissing,

    /// The caller lacks permission for the operation.
    #[error("access denied")]
    Forbidden,

    /// A conditional put found the object already present.
    #[error("object already exists")]
    AlreadyExists,

    /// Anything the classification did not recognize.
    #[error("backend error {code}: {message}")]
    Backend { code: String, message: String },
}

impl ClientError {
    /// Build the passthrough variant.
    pub fn backend(code: impl Into<String>, message: impl Into<String>) -> Self {
        ClientError::Backend {
            code: code.into(),
            message: message.into(),
        }
    }
}

/// Result alias for client operations.
pub type ClientResult<T> = Result<T, ClientError>;

/// The six remote operations the adapter is built on, plus conditional put.
///
/// All operations address physical object names, not logical keys; the
/// caller runs names through the key codec first.
#[async_trait]
pub trait ObjectClient: Send + Sync {
    /// Upload `body` under `name`, replacing any existing object.
    async fn put_object(&self, name: &str, body: Bytes) -> ClientResult<()>;

    /// Upload `body` under `name` only if no such object exists.
    ///
    /// Fails with [`ClientError::AlreadyExists`] when the name is taken.
    async fn put_object_if_absent(&self, name: &str, body: Bytes) -> ClientResult<()>;

    /// Fetch the object body, normalized to a byte sequence whatever the
    /// transport's native representation.
    async fn get_object(&self, name: &str) -> ClientResult<Bytes>;

    /// Metadata-only existence probe.
    async fn head_object(&self, name: &str) -> ClientResult<()>;

    /// Delete the object under `name`.
    async fn delete_object(&self, name: &str) -> ClientResult<()>;

    /// List one page of names under `prefix`, starting strictly after
    /// `start_after` when given.
    async fn list_objects(
        &self,
        prefix: &str,
        start_after: Option<&str>,
    ) -> ClientResult<ObjectPage>;

    /// Create the bucket this client is bound to. Succeeds if the bucket
    /// already belongs to the caller.
    async fn create_bucket(&self) -> ClientResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_error_display() {
        let err = ClientError::backend("SlowDown", "reduce request rate");
        assert_eq!(
            err.to_string(),
            "backend error SlowDown: reduce request rate"
        );
    }
}
