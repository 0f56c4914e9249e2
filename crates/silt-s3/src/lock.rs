//! Repository locking over a sentinel object.
//!
//! The mere existence of an empty object at `<scope>/repo.lock` signals
//! that the repository under `scope` is in use. This keeps several nodes
//! sharing one bucket from opening the same repository concurrently.
//!
//! Acquisition probes the sentinel first and fails closed: a probe that
//! errors is treated as contention, not availability. The sentinel itself
//! is then created with a conditional put, so two lockers racing past the
//! probe cannot both win.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use silt_datastore::{
    DatastoreError, DatastoreResult, Key, LockCloser, LockGuard, RepoLock,
};
use tracing::{debug, info};

use crate::client::{ClientError, ObjectClient};
use crate::path::StorePath;

const LOCK_FILE: &str = "repo.lock";

/// Sentinel-object lock over repositories in one bucket.
pub struct S3Lock {
    client: Arc<dyn ObjectClient>,
    path: StorePath,
}

impl S3Lock {
    /// A lock addressing sentinels under the given store path.
    pub fn new(client: Arc<dyn ObjectClient>, path: StorePath) -> Self {
        S3Lock { client, path }
    }

    /// Physical name of the sentinel for `scope`.
    fn sentinel_name(&self, scope: &Key) -> String {
        self.path.full_key(&scope.child(LOCK_FILE))
    }
}

impl std::fmt::Debug for S3Lock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3Lock")
            .field("path", &self.path)
            .finish()
    }
}

#[async_trait]
impl RepoLock for S3Lock {
    async fn lock(&self, scope: &Key) -> DatastoreResult<LockGuard> {
        match self.locked(scope).await {
            Ok(false) => {}
            // Contended, or the probe failed and we cannot tell.
            Ok(true) | Err(_) => return Err(DatastoreError::AlreadyLocked(scope.clone())),
        }

        let name = self.sentinel_name(scope);
        match self
            .client
            .put_object_if_absent(&name, Bytes::new())
            .await
        {
            Ok(()) => {}
            Err(ClientError::AlreadyExists) => {
                return Err(DatastoreError::AlreadyLocked(scope.clone()));
            }
            Err(err) => {
                return Err(DatastoreError::WriteFailed {
                    key: scope.child(LOCK_FILE),
                    reason: err.to_string(),
                });
            }
        }

        info!(scope = %scope, "acquired repository lock");
        Ok(LockGuard::registered(Arc::new(SentinelCloser {
            client: Arc::clone(&self.client),
            key: scope.child(LOCK_FILE),
            name,
        })))
    }

    async fn locked(&self, scope: &Key) -> DatastoreResult<bool> {
        match self.client.head_object(&self.sentinel_name(scope)).await {
            Ok(()) => Ok(true),
            Err(ClientError::NotFound) => Ok(false),
            Err(err) => Err(DatastoreError::UnknownBackend(format!(
                "lock probe for {scope}: {err}"
            ))),
        }
    }
}

/// Deletes the sentinel on close. A sentinel that is already gone is fine.
struct SentinelCloser {
    client: Arc<dyn ObjectClient>,
    key: Key,
    name: String,
}

#[async_trait]
impl LockCloser for SentinelCloser {
    async fn close(&self) -> DatastoreResult<()> {
        match self.client.delete_object(&self.name).await {
            Ok(()) | Err(ClientError::NotFound) => {
                debug!(name = %self.name, "released repository lock");
                Ok(())
            }
            Err(err) => Err(DatastoreError::DeleteFailed {
                key: self.key.clone(),
                reason: err.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::client::{ClientResult, ObjectPage};
    use crate::memory::InMemoryObjectClient;

    fn lock() -> (Arc<InMemoryObjectClient>, S3Lock) {
        let client = Arc::new(InMemoryObjectClient::new());
        let lock = S3Lock::new(
            Arc::clone(&client) as Arc<dyn ObjectClient>,
            StorePath::new("ipfs"),
        );
        (client, lock)
    }

    #[tokio::test]
    async fn lock_creates_the_sentinel() {
        let (client, lock) = lock();
        let guard = lock.lock(&Key::new("/repo")).await.unwrap();
        assert!(client.contains("ipfs/repo/repo.lock"));
        assert!(lock.locked(&Key::new("/repo")).await.unwrap());
        guard.close().await.unwrap();
        assert!(!client.contains("ipfs/repo/repo.lock"));
    }

    #[tokio::test]
    async fn second_lock_on_same_scope_is_contended() {
        let (_, lock) = lock();
        let scope = Key::new("/repo");
        let guard = lock.lock(&scope).await.unwrap();

        let err = lock.lock(&scope).await.unwrap_err();
        assert!(matches!(err, DatastoreError::AlreadyLocked(_)));

        // Releasing the first handle frees the scope for a third attempt.
        guard.close().await.unwrap();
        let guard = lock.lock(&scope).await.unwrap();
        guard.close().await.unwrap();
    }

    #[tokio::test]
    async fn scopes_lock_independently() {
        let (_, lock) = lock();
        let a = lock.lock(&Key::new("/repo-a")).await.unwrap();
        let b = lock.lock(&Key::new("/repo-b")).await.unwrap();
        a.close().await.unwrap();
        b.close().await.unwrap();
    }

    #[tokio::test]
    async fn unlocked_scope_probes_false() {
        let (_, lock) = lock();
        assert!(!lock.locked(&Key::new("/repo")).await.unwrap());
    }

    #[tokio::test]
    async fn close_tolerates_missing_sentinel() {
        let (client, lock) = lock();
        let guard = lock.lock(&Key::new("/repo")).await.unwrap();
        // Someone else cleaned the sentinel up behind our back.
        client.delete_object("ipfs/repo/repo.lock").await.unwrap();
        guard.close().await.unwrap();
    }

    /// Delegates to an inner client but fails every head probe.
    struct FailingHead(InMemoryObjectClient);

    #[async_trait]
    impl ObjectClient for FailingHead {
        async fn put_object(&self, name: &str, body: Bytes) -> ClientResult<()> {
            self.0.put_object(name, body).await
        }
        async fn put_object_if_absent(&self, name: &str, body: Bytes) -> ClientResult<()> {
            self.0.put_object_if_absent(name, body).await
        }
        async fn get_object(&self, name: &str) -> ClientResult<Bytes> {
            self.0.get_object(name).await
        }
        async fn head_object(&self, _name: &str) -> ClientResult<()> {
            Err(ClientError::backend("InternalError", "probe exploded"))
        }
        async fn delete_object(&self, name: &str) -> ClientResult<()> {
            self.0.delete_object(name).await
        }
        async fn list_objects(
            &self,
            prefix: &str,
            start_after: Option<&str>,
        ) -> ClientResult<ObjectPage> {
            self.0.list_objects(prefix, start_after).await
        }
        async fn create_bucket(&self) -> ClientResult<()> {
            self.0.create_bucket().await
        }
    }

    #[tokio::test]
    async fn failed_probe_propagates_from_locked() {
        let lock = S3Lock::new(
            Arc::new(FailingHead(InMemoryObjectClient::new())),
            StorePath::new("ipfs"),
        );
        assert!(lock.locked(&Key::new("/repo")).await.is_err());
    }

    #[tokio::test]
    async fn failed_probe_is_treated_as_contention_by_lock() {
        let lock = S3Lock::new(
            Arc::new(FailingHead(InMemoryObjectClient::new())),
            StorePath::new("ipfs"),
        );
        let err = lock.lock(&Key::new("/repo")).await.unwrap_err();
        assert!(matches!(err, DatastoreError::AlreadyLocked(_)));
    }

    #[tokio::test]
    async fn racing_lockers_cannot_both_win() {
        // Both racers pass the probe before either creates the sentinel;
        // the conditional put decides the winner.
        let (client, _) = lock();
        let first = client
            .put_object_if_absent("ipfs/repo/repo.lock", Bytes::new())
            .await;
        let second = client
            .put_object_if_absent("ipfs/repo/repo.lock", Bytes::new())
            .await;
        assert!(first.is_ok());
        assert_eq!(second, Err(ClientError::AlreadyExists));
    }
}
