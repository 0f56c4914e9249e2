use async_trait::async_trait;
use bytes::Bytes;

use crate::error::DatastoreResult;
use crate::key::Key;
use crate::query::{Query, QueryOptions, QueryStream};

/// An ordered key-value datastore.
///
/// All implementations must satisfy these invariants:
/// - Keys are addressed in their normal form; two keys that normalize
///   identically refer to the same record.
/// - Values are opaque byte sequences; the store never interprets them.
/// - Every operation suspends only at remote-call boundaries; there is no
///   owned background work.
/// - `open` and `close` are idempotent.
/// - Enumeration yields keys in byte-wise order of their normal form and
///   hides any page-size limits of the backing store.
#[async_trait]
pub trait Datastore: Send + Sync {
    /// Verify the store is reachable, creating its root state if needed.
    ///
    /// Safe to call multiple times.
    async fn open(&self) -> DatastoreResult<()>;

    /// Release any local state. Safe to call multiple times.
    async fn close(&self) -> DatastoreResult<()>;

    /// Store `value` under `key`, replacing any previous value.
    async fn put(&self, key: &Key, value: Bytes) -> DatastoreResult<()>;

    /// Fetch the value stored under `key`.
    ///
    /// Returns [`DatastoreError::NotFound`](crate::DatastoreError::NotFound)
    /// if the key is absent.
    async fn get(&self, key: &Key) -> DatastoreResult<Bytes>;

    /// Check whether `key` exists without fetching its value.
    async fn has(&self, key: &Key) -> DatastoreResult<bool>;

    /// Remove the record under `key`.
    ///
    /// Deleting an already-absent key is backend-dependent; callers must not
    /// rely on it being silent.
    async fn delete(&self, key: &Key) -> DatastoreResult<()>;

    /// Enumerate keys (and values, unless `keys_only`) under the query
    /// prefix as a lazy stream.
    ///
    /// A listing failure on any page ends the stream with an error. A key
    /// deleted between being listed and its value fetched is skipped
    /// silently.
    fn query(&self, query: Query, options: QueryOptions) -> QueryStream;

    /// Create an empty write batch against this store.
    fn batch(&self) -> Box<dyn Batch>;
}

/// A single-use buffer of pending writes.
///
/// Nothing is sent until [`Batch::commit`], which issues every queued put
/// and delete concurrently and resolves once all have settled. Batches are
/// best-effort, not transactional: there is no ordering guarantee between
/// queued operations, a failure surfaces to the caller, and operations that
/// already applied are NOT rolled back.
#[async_trait]
pub trait Batch: Send {
    /// Queue a put. No I/O happens until commit.
    fn put(&mut self, key: Key, value: Bytes);

    /// Queue a delete. No I/O happens until commit.
    fn delete(&mut self, key: Key);

    /// Issue every queued operation concurrently and wait for all of them
    /// to settle, then surface the first failure if any occurred.
    async fn commit(self: Box<Self>) -> DatastoreResult<()>;
}
