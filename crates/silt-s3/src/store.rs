use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use futures::{future, TryStreamExt};
use silt_datastore::{
    Batch, Datastore, DatastoreError, DatastoreResult, Key, Pair, Query, QueryOptions,
    QueryStream,
};
use tracing::{debug, info};

use crate::batch::S3Batch;
use crate::cache::{CachedGet, ReadCache};
use crate::client::{ClientError, ObjectClient};
use crate::config::{ConfigError, S3DatastoreConfig};
use crate::list::key_walk;
use crate::path::StorePath;

/// Datastore over an S3-compatible bucket.
///
/// Keys map to object names under a configured path prefix; values are
/// stored as object bodies, byte for byte. Reads optionally go through a
/// TTL cache, enumeration hides the remote listing's page-size limits, and
/// batches fan their writes out concurrently at commit.
///
/// The store is cheap to clone; clones share the client and cache.
#[derive(Clone)]
pub struct S3Datastore {
    inner: Arc<Inner>,
}

struct Inner {
    client: Arc<dyn ObjectClient>,
    path: StorePath,
    create_if_missing: bool,
    treat_forbidden_as_missing: bool,
    cache: ReadCache,
}

impl S3Datastore {
    /// Build a store over `client` with the given configuration.
    pub fn new(
        client: Arc<dyn ObjectClient>,
        config: S3DatastoreConfig,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let cache = if config.cache_enabled {
            ReadCache::enabled(config.cache_ttl, config.not_found_cache_ttl)
        } else {
            ReadCache::disabled()
        };
        Ok(S3Datastore {
            inner: Arc::new(Inner {
                client,
                path: StorePath::new(&config.path),
                create_if_missing: config.create_if_missing,
                treat_forbidden_as_missing: config.treat_forbidden_as_missing,
                cache,
            }),
        })
    }

    /// The path prefix this store writes under.
    pub fn path(&self) -> &StorePath {
        &self.inner.path
    }

    async fn ensure_bucket(&self) -> Result<(), ClientError> {
        self.inner.client.create_bucket().await
    }
}

impl std::fmt::Debug for S3Datastore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3Datastore")
            .field("path", &self.inner.path)
            .field("cache", &self.inner.cache)
            .finish()
    }
}

#[async_trait]
impl Datastore for S3Datastore {
    async fn open(&self) -> DatastoreResult<()> {
        let inner = &self.inner;
        if inner.path.is_bucket_root() {
            // No marker object to probe at the bucket root; a one-page
            // listing answers whether the bucket is reachable.
            match inner.client.list_objects("", None).await {
                Ok(_) => Ok(()),
                Err(ClientError::BucketMissing) if inner.create_if_missing => {
                    info!("bucket missing on open, creating");
                    self.ensure_bucket()
                        .await
                        .map_err(|err| DatastoreError::OpenFailed(err.to_string()))
                }
                Err(err) => Err(DatastoreError::OpenFailed(err.to_string())),
            }
        } else {
            let marker = inner.path.root_marker();
            match inner.client.head_object(&marker).await {
                Ok(()) => Ok(()),
                // First open of this path: write the empty marker so later
                // opens find it. The put path handles a missing bucket.
                Err(ClientError::NotFound) => self
                    .put(&Key::root(), Bytes::new())
                    .await
                    .map_err(|err| DatastoreError::OpenFailed(err.to_string())),
                Err(ClientError::BucketMissing) if inner.create_if_missing => {
                    info!("bucket missing on open, creating");
                    self.ensure_bucket()
                        .await
                        .map_err(|err| DatastoreError::OpenFailed(err.to_string()))?;
                    self.put(&Key::root(), Bytes::new())
                        .await
                        .map_err(|err| DatastoreError::OpenFailed(err.to_string()))
                }
                Err(err) => Err(DatastoreError::OpenFailed(err.to_string())),
            }
        }
    }

    async fn close(&self) -> DatastoreResult<()> {
        self.inner.cache.clear();
        Ok(())
    }

    async fn put(&self, key: &Key, value: Bytes) -> DatastoreResult<()> {
        let inner = &self.inner;
        let name = inner.path.full_key(key);
        debug!(key = %key, bytes = value.len(), "put");

        match inner.client.put_object(&name, value.clone()).await {
            Ok(()) => {}
            Err(ClientError::BucketMissing) if inner.create_if_missing => {
                info!("bucket missing on put, creating and retrying once");
                self.ensure_bucket()
                    .await
                    .map_err(|err| DatastoreError::WriteFailed {
                        key: key.clone(),
                        reason: err.to_string(),
                    })?;
                inner
                    .client
                    .put_object(&name, value)
                    .await
                    .map_err(|err| DatastoreError::WriteFailed {
                        key: key.clone(),
                        reason: err.to_string(),
                    })?;
            }
            Err(err) => {
                return Err(DatastoreError::WriteFailed {
                    key: key.clone(),
                    reason: err.to_string(),
                });
            }
        }

        inner.cache.invalidate(&name);
        Ok(())
    }

    async fn get(&self, key: &Key) -> DatastoreResult<Bytes> {
        let inner = &self.inner;
        let name = inner.path.full_key(key);

        match inner.cache.lookup_get(&name) {
            CachedGet::Value(value) => return Ok(value),
            CachedGet::NotFound => return Err(DatastoreError::NotFound(key.clone())),
            CachedGet::Miss => {}
        }

        match inner.client.get_object(&name).await {
            Ok(value) => {
                inner.cache.record_value(&name, &value);
                Ok(value)
            }
            Err(ClientError::NotFound) => {
                inner.cache.record_missing(&name);
                Err(DatastoreError::NotFound(key.clone()))
            }
            Err(err) => Err(DatastoreError::UnknownBackend(format!(
                "get {key}: {err}"
            ))),
        }
    }

    async fn has(&self, key: &Key) -> DatastoreResult<bool> {
        let inner = &self.inner;
        let name = inner.path.full_key(key);

        if let Some(present) = inner.cache.lookup_has(&name) {
            return Ok(present);
        }

        match inner.client.head_object(&name).await {
            Ok(()) => {
                inner.cache.record_has(&name, true);
                Ok(true)
            }
            Err(ClientError::NotFound) => {
                inner.cache.record_has(&name, false);
                Ok(false)
            }
            // Without list permission the service cannot distinguish a
            // missing object from a forbidden one; only equate the two when
            // the caller opted in.
            Err(ClientError::Forbidden) if inner.treat_forbidden_as_missing => Ok(false),
            Err(err) => Err(DatastoreError::UnknownBackend(format!(
                "has {key}: {err}"
            ))),
        }
    }

    async fn delete(&self, key: &Key) -> DatastoreResult<()> {
        let inner = &self.inner;
        let name = inner.path.full_key(key);
        debug!(key = %key, "delete");

        // Evict before the remote call so a concurrent read cannot re-see
        // the old value once the delete has been issued.
        inner.cache.invalidate(&name);

        inner
            .client
            .delete_object(&name)
            .await
            .map_err(|err| DatastoreError::DeleteFailed {
                key: key.clone(),
                reason: err.to_string(),
            })
    }

    fn query(&self, query: Query, options: QueryOptions) -> QueryStream {
        let inner = &self.inner;
        let physical_prefix = inner.path.scoped_prefix(query.prefix.as_ref());
        let walk = key_walk(
            Arc::clone(&inner.client),
            inner.path.clone(),
            physical_prefix,
            options.abort,
        );

        // Physical prefix matching is byte-wise and over-approximates: with
        // prefix /ab it also returns /abc/x. Re-check the decoded keys.
        let prefix = query.prefix;
        let keys = walk.try_filter(move |key| {
            future::ready(prefix.as_ref().map_or(true, |p| key.has_prefix(p)))
        });

        if query.keys_only {
            Box::pin(keys.map_ok(|key| Pair { key, value: None }))
        } else {
            let store = self.clone();
            Box::pin(keys.try_filter_map(move |key| {
                let store = store.clone();
                async move {
                    match store.get(&key).await {
                        Ok(value) => Ok(Some(Pair {
                            key,
                            value: Some(value),
                        })),
                        // Deleted between being listed and being fetched.
                        Err(err) if err.is_not_found() => Ok(None),
                        Err(err) => Err(err),
                    }
                }
            }))
        }
    }

    fn batch(&self) -> Box<dyn Batch> {
        Box::new(S3Batch::new(self.clone()))
    }
}
