use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream;

use crate::error::{DatastoreError, DatastoreResult};
use crate::key::Key;
use crate::query::{AbortSignal, Pair, Query, QueryOptions, QueryStream};
use crate::traits::{Batch, Datastore};

/// In-memory, BTreeMap-based datastore.
///
/// Intended for tests and embedding, and the reference implementation of the
/// [`Datastore`] contract. Records are held in an ordered map behind a
/// `RwLock`, so enumeration comes out in key order for free. Queries iterate
/// over a snapshot taken at call time; a batch commit applies every queued
/// operation under one write lock.
#[derive(Clone)]
pub struct InMemoryDatastore {
    entries: Arc<RwLock<BTreeMap<Key, Bytes>>>,
}

impl InMemoryDatastore {
    /// Create a new empty in-memory datastore.
    pub fn new() -> Self {
        InMemoryDatastore {
            entries: Arc::new(RwLock::new(BTreeMap::new())),
        }
    }

    /// Number of records currently stored.
    pub fn len(&self) -> usize {
        self.entries.read().expect("lock poisoned").len()
    }

    /// Returns `true` if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.read().expect("lock poisoned").is_empty()
    }

    /// Remove all records.
    pub fn clear(&self) {
        self.entries.write().expect("lock poisoned").clear();
    }
}

impl Default for InMemoryDatastore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for InMemoryDatastore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryDatastore")
            .field("record_count", &self.len())
            .finish()
    }
}

#[async_trait]
impl Datastore for InMemoryDatastore {
    async fn open(&self) -> DatastoreResult<()> {
        Ok(())
    }

    async fn close(&self) -> DatastoreResult<()> {
        Ok(())
    }

    async fn put(&self, key: &Key, value: Bytes) -> DatastoreResult<()> {
        self.entries
            .write()
            .expect("lock poisoned")
            .insert(key.clone(), value);
        Ok(())
    }

    async fn get(&self, key: &Key) -> DatastoreResult<Bytes> {
        self.entries
            .read()
            .expect("lock poisoned")
            .get(key)
            .cloned()
            .ok_or_else(|| DatastoreError::NotFound(key.clone()))
    }

    async fn has(&self, key: &Key) -> DatastoreResult<bool> {
        Ok(self
            .entries
            .read()
            .expect("lock poisoned")
            .contains_key(key))
    }

    async fn delete(&self, key: &Key) -> DatastoreResult<()> {
        self.entries.write().expect("lock poisoned").remove(key);
        Ok(())
    }

    fn query(&self, query: Query, options: QueryOptions) -> QueryStream {
        if options.abort.as_ref().is_some_and(AbortSignal::is_aborted) {
            return Box::pin(stream::empty());
        }

        let pairs: Vec<Pair> = {
            let entries = self.entries.read().expect("lock poisoned");
            entries
                .iter()
                .filter(|(key, _)| {
                    query
                        .prefix
                        .as_ref()
                        .map_or(true, |prefix| key.has_prefix(prefix))
                })
                .map(|(key, value)| Pair {
                    key: key.clone(),
                    value: (!query.keys_only).then(|| value.clone()),
                })
                .collect()
        };

        Box::pin(stream::iter(pairs.into_iter().map(Ok)))
    }

    fn batch(&self) -> Box<dyn Batch> {
        Box::new(MemoryBatch {
            entries: Arc::clone(&self.entries),
            puts: Vec::new(),
            deletes: Vec::new(),
        })
    }
}

/// Batch over an [`InMemoryDatastore`]. Applied under a single write lock at
/// commit, so for this backend a commit happens to be atomic; callers must
/// not rely on that, it is not part of the [`Batch`] contract.
struct MemoryBatch {
    entries: Arc<RwLock<BTreeMap<Key, Bytes>>>,
    puts: Vec<(Key, Bytes)>,
    deletes: Vec<Key>,
}

#[async_trait]
impl Batch for MemoryBatch {
    fn put(&mut self, key: Key, value: Bytes) {
        self.puts.push((key, value));
    }

    fn delete(&mut self, key: Key) {
        self.deletes.push(key);
    }

    async fn commit(self: Box<Self>) -> DatastoreResult<()> {
        let mut entries = self.entries.write().expect("lock poisoned");
        for (key, value) in self.puts {
            entries.insert(key, value);
        }
        for key in self.deletes {
            entries.remove(&key);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::TryStreamExt;

    fn b(s: &str) -> Bytes {
        Bytes::copy_from_slice(s.as_bytes())
    }

    // -----------------------------------------------------------------------
    // Core CRUD
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn put_get_round_trip() {
        let store = InMemoryDatastore::new();
        store.put(&Key::new("/a"), b("hello")).await.unwrap();
        assert_eq!(store.get(&Key::new("/a")).await.unwrap(), b("hello"));
    }

    #[tokio::test]
    async fn get_missing_is_not_found() {
        let store = InMemoryDatastore::new();
        let err = store.get(&Key::new("/missing")).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn put_replaces_previous_value() {
        let store = InMemoryDatastore::new();
        let key = Key::new("/a");
        store.put(&key, b("one")).await.unwrap();
        store.put(&key, b("two")).await.unwrap();
        assert_eq!(store.get(&key).await.unwrap(), b("two"));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn has_reflects_existence() {
        let store = InMemoryDatastore::new();
        let key = Key::new("/a");
        assert!(!store.has(&key).await.unwrap());
        store.put(&key, b("x")).await.unwrap();
        assert!(store.has(&key).await.unwrap());
        store.delete(&key).await.unwrap();
        assert!(!store.has(&key).await.unwrap());
    }

    #[tokio::test]
    async fn delete_then_get_is_not_found() {
        let store = InMemoryDatastore::new();
        let key = Key::new("/a");
        store.put(&key, b("x")).await.unwrap();
        store.delete(&key).await.unwrap();
        assert!(store.get(&key).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn open_and_close_are_idempotent() {
        let store = InMemoryDatastore::new();
        store.open().await.unwrap();
        store.open().await.unwrap();
        store.close().await.unwrap();
        store.close().await.unwrap();
    }

    // -----------------------------------------------------------------------
    // Query
    // -----------------------------------------------------------------------

    async fn seeded() -> InMemoryDatastore {
        let store = InMemoryDatastore::new();
        for key in ["/ab/x", "/ab/y", "/abc/z", "/b"] {
            store.put(&Key::new(key), b(key)).await.unwrap();
        }
        store
    }

    #[tokio::test]
    async fn query_yields_all_keys_in_order() {
        let store = seeded().await;
        let pairs: Vec<Pair> = store
            .query(Query::all(), QueryOptions::default())
            .try_collect()
            .await
            .unwrap();
        let keys: Vec<&str> = pairs.iter().map(|p| p.key.as_str()).collect();
        assert_eq!(keys, vec!["/ab/x", "/ab/y", "/abc/z", "/b"]);
    }

    #[tokio::test]
    async fn query_prefix_is_separator_aligned() {
        let store = seeded().await;
        let pairs: Vec<Pair> = store
            .query(Query::under(Key::new("/ab")), QueryOptions::default())
            .try_collect()
            .await
            .unwrap();
        let keys: Vec<&str> = pairs.iter().map(|p| p.key.as_str()).collect();
        // "/abc/z" matches the raw string prefix but not the aligned one.
        assert_eq!(keys, vec!["/ab/x", "/ab/y"]);
    }

    #[tokio::test]
    async fn keys_only_query_omits_values() {
        let store = seeded().await;
        let pairs: Vec<Pair> = store
            .query(Query::all().keys_only(), QueryOptions::default())
            .try_collect()
            .await
            .unwrap();
        assert!(pairs.iter().all(|p| p.value.is_none()));
    }

    #[tokio::test]
    async fn aborted_query_yields_nothing() {
        let store = seeded().await;
        let abort = AbortSignal::new();
        abort.abort();
        let pairs: Vec<Pair> = store
            .query(
                Query::all(),
                QueryOptions {
                    abort: Some(abort),
                },
            )
            .try_collect()
            .await
            .unwrap();
        assert!(pairs.is_empty());
    }

    // -----------------------------------------------------------------------
    // Batch
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn batch_is_buffered_until_commit() {
        let store = InMemoryDatastore::new();
        let mut batch = store.batch();
        batch.put(Key::new("/a"), b("1"));
        assert!(!store.has(&Key::new("/a")).await.unwrap());
        batch.commit().await.unwrap();
        assert!(store.has(&Key::new("/a")).await.unwrap());
    }

    #[tokio::test]
    async fn batch_applies_puts_and_deletes() {
        let store = InMemoryDatastore::new();
        store.put(&Key::new("/old1"), b("x")).await.unwrap();
        store.put(&Key::new("/old2"), b("y")).await.unwrap();

        let mut batch = store.batch();
        batch.put(Key::new("/new1"), b("1"));
        batch.put(Key::new("/new2"), b("2"));
        batch.put(Key::new("/new3"), b("3"));
        batch.delete(Key::new("/old1"));
        batch.delete(Key::new("/old2"));
        batch.commit().await.unwrap();

        for key in ["/new1", "/new2", "/new3"] {
            assert!(store.has(&Key::new(key)).await.unwrap());
        }
        for key in ["/old1", "/old2"] {
            assert!(!store.has(&Key::new(key)).await.unwrap());
        }
    }
}
