use async_trait::async_trait;
use bytes::Bytes;
use futures::future::join_all;
use silt_datastore::{Batch, Datastore, DatastoreResult, Key};

use crate::store::S3Datastore;

/// Buffered writes against an [`S3Datastore`].
///
/// Append-only and single-use: nothing reaches the remote store until
/// [`Batch::commit`], which issues every queued put and delete concurrently
/// with no fan-out limit and waits for all of them to settle. Queued
/// operations are not deduplicated and have no defined relative ordering;
/// a key that is both put and deleted in one batch ends up in an
/// unspecified state. Commit is best-effort: the first failure surfaces,
/// and operations that already applied stay applied.
pub struct S3Batch {
    store: S3Datastore,
    puts: Vec<(Key, Bytes)>,
    deletes: Vec<Key>,
}

impl S3Batch {
    pub(crate) fn new(store: S3Datastore) -> Self {
        S3Batch {
            store,
            puts: Vec::new(),
            deletes: Vec::new(),
        }
    }

    /// Number of queued operations.
    pub fn len(&self) -> usize {
        self.puts.len() + self.deletes.len()
    }

    /// Returns `true` if nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.puts.is_empty() && self.deletes.is_empty()
    }
}

impl std::fmt::Debug for S3Batch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3Batch")
            .field("pending_puts", &self.puts.len())
            .field("pending_deletes", &self.deletes.len())
            .finish()
    }
}

#[async_trait]
impl Batch for S3Batch {
    fn put(&mut self, key: Key, value: Bytes) {
        self.puts.push((key, value));
    }

    fn delete(&mut self, key: Key) {
        self.deletes.push(key);
    }

    async fn commit(self: Box<Self>) -> DatastoreResult<()> {
        let S3Batch {
            store,
            puts,
            deletes,
        } = *self;

        let put_ops = puts.into_iter().map(|(key, value)| {
            let store = store.clone();
            async move { store.put(&key, value).await }
        });
        let delete_ops = deletes.into_iter().map(|key| {
            let store = store.clone();
            async move { store.delete(&key).await }
        });

        let (put_results, delete_results) =
            futures::join!(join_all(put_ops), join_all(delete_ops));

        for result in put_results.into_iter().chain(delete_results) {
            result?;
        }
        Ok(())
    }
}
