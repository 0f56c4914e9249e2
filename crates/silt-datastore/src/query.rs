//! Query types for datastore enumeration.

use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use futures::Stream;

use crate::error::DatastoreResult;
use crate::key::Key;

/// Selection criteria for [`Datastore::query`](crate::Datastore::query).
#[derive(Clone, Debug, Default)]
pub struct Query {
    /// Only yield keys under this logical prefix (separator-aligned).
    pub prefix: Option<Key>,
    /// Skip value hydration and yield keys alone.
    pub keys_only: bool,
}

impl Query {
    /// A query over everything in the store.
    pub fn all() -> Self {
        Query::default()
    }

    /// A query scoped to the given prefix.
    pub fn under(prefix: Key) -> Self {
        Query {
            prefix: Some(prefix),
            keys_only: false,
        }
    }

    /// Drop value hydration from this query.
    pub fn keys_only(mut self) -> Self {
        self.keys_only = true;
        self
    }
}

/// Per-call options for [`Datastore::query`](crate::Datastore::query).
#[derive(Clone, Debug, Default)]
pub struct QueryOptions {
    /// Checked before each listing page; once set, the enumeration ends
    /// cleanly without an error.
    pub abort: Option<AbortSignal>,
}

/// One enumerated entry. `value` is `None` for keys-only queries.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Pair {
    pub key: Key,
    pub value: Option<Bytes>,
}

/// A set-once cancellation flag shared between a caller and an in-flight
/// enumeration.
///
/// Aborting is cooperative: it is observed between listing pages, never in
/// the middle of an issued remote call.
#[derive(Clone, Debug, Default)]
pub struct AbortSignal {
    aborted: Arc<AtomicBool>,
}

impl AbortSignal {
    /// A fresh, unset signal.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the signal. Idempotent; cannot be unset.
    pub fn abort(&self) {
        self.aborted.store(true, Ordering::Relaxed);
    }

    /// Returns `true` once [`AbortSignal::abort`] has been called.
    pub fn is_aborted(&self) -> bool {
        self.aborted.load(Ordering::Relaxed)
    }
}

/// The lazy sequence produced by a query.
///
/// Each call to `query` builds a fresh stream that re-runs the full
/// paginated walk from the start of the cursor protocol.
pub type QueryStream = Pin<Box<dyn Stream<Item = DatastoreResult<Pair>> + Send>>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn abort_signal_is_sticky() {
        let signal = AbortSignal::new();
        assert!(!signal.is_aborted());
        signal.abort();
        assert!(signal.is_aborted());
        signal.abort();
        assert!(signal.is_aborted());
    }

    #[test]
    fn abort_is_visible_through_clones() {
        let signal = AbortSignal::new();
        let clone = signal.clone();
        signal.abort();
        assert!(clone.is_aborted());
    }

    #[test]
    fn query_builders() {
        let q = Query::under(Key::new("/blocks")).keys_only();
        assert_eq!(q.prefix, Some(Key::new("/blocks")));
        assert!(q.keys_only);
        assert!(Query::all().prefix.is_none());
    }
}
