//! Optional read-through cache for get/has results.
//!
//! Two families of entries, keyed by physical object name: data entries
//! (a value, or a recorded not-found) and existence entries (a boolean).
//! Every entry carries its own deadline. Positive results live for the
//! configured default TTL; negative results use a separately configured,
//! shorter TTL -- absence is more likely to change soon, e.g. under a
//! concurrent create.
//!
//! Entries are timed with `tokio::time::Instant`, so tests drive expiry
//! with a paused runtime clock instead of real sleeps.

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::Duration;

use bytes::Bytes;
use tokio::time::Instant;

/// Outcome of a data-cache lookup.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum CachedGet {
    /// A previously fetched value.
    Value(Bytes),
    /// A recorded not-found; re-raise without a remote call.
    NotFound,
    /// Nothing cached; fall through to the remote store.
    Miss,
}

#[derive(Clone, Debug)]
enum DataEntry {
    Value(Bytes),
    Missing,
}

#[derive(Clone, Debug)]
struct Entry<T> {
    value: T,
    expires_at: Instant,
}

impl<T> Entry<T> {
    fn live(&self) -> bool {
        Instant::now() < self.expires_at
    }
}

/// Read-through cache with differentiated positive/negative TTLs.
///
/// A disabled cache never stores anything and every lookup misses. Safe for
/// concurrent use from multiple in-flight operations; overlapping population
/// is last-write-wins.
pub(crate) struct ReadCache {
    ttls: Option<Ttls>,
    data: RwLock<HashMap<String, Entry<DataEntry>>>,
    exists: RwLock<HashMap<String, Entry<bool>>>,
}

#[derive(Clone, Copy, Debug)]
struct Ttls {
    value: Duration,
    not_found: Duration,
}

impl ReadCache {
    /// A cache where every operation is a no-op.
    pub(crate) fn disabled() -> Self {
        ReadCache {
            ttls: None,
            data: RwLock::new(HashMap::new()),
            exists: RwLock::new(HashMap::new()),
        }
    }

    /// An enabled cache with the given positive and negative TTLs.
    pub(crate) fn enabled(value_ttl: Duration, not_found_ttl: Duration) -> Self {
        ReadCache {
            ttls: Some(Ttls {
                value: value_ttl,
                not_found: not_found_ttl,
            }),
            data: RwLock::new(HashMap::new()),
            exists: RwLock::new(HashMap::new()),
        }
    }

    pub(crate) fn is_enabled(&self) -> bool {
        self.ttls.is_some()
    }

    /// Look up a data entry. Expired entries behave as misses and are
    /// pruned on touch.
    pub(crate) fn lookup_get(&self, name: &str) -> CachedGet {
        if self.ttls.is_none() {
            return CachedGet::Miss;
        }
        let mut data = self.data.write().expect("cache lock poisoned");
        match data.get(name) {
            Some(entry) if entry.live() => match &entry.value {
                DataEntry::Value(bytes) => CachedGet::Value(bytes.clone()),
                DataEntry::Missing => CachedGet::NotFound,
            },
            Some(_) => {
                data.remove(name);
                CachedGet::Miss
            }
            None => CachedGet::Miss,
        }
    }

    /// Record a fetched value under the default TTL.
    pub(crate) fn record_value(&self, name: &str, value: &Bytes) {
        if let Some(ttls) = self.ttls {
            self.data.write().expect("cache lock poisoned").insert(
                name.to_string(),
                Entry {
                    value: DataEntry::Value(value.clone()),
                    expires_at: Instant::now() + ttls.value,
                },
            );
        }
    }

    /// Record a not-found result under the shorter negative TTL.
    pub(crate) fn record_missing(&self, name: &str) {
        if let Some(ttls) = self.ttls {
            self.data.write().expect("cache lock poisoned").insert(
                name.to_string(),
                Entry {
                    value: DataEntry::Missing,
                    expires_at: Instant::now() + ttls.not_found,
                },
            );
        }
    }

    /// Look up an existence entry.
    pub(crate) fn lookup_has(&self, name: &str) -> Option<bool> {
        self.ttls?;
        let mut exists = self.exists.write().expect("cache lock poisoned");
        match exists.get(name) {
            Some(entry) if entry.live() => Some(entry.value),
            Some(_) => {
                exists.remove(name);
                None
            }
            None => None,
        }
    }

    /// Record an existence probe result. `false` is a negative result and
    /// uses the negative TTL.
    pub(crate) fn record_has(&self, name: &str, present: bool) {
        if let Some(ttls) = self.ttls {
            let ttl = if present { ttls.value } else { ttls.not_found };
            self.exists.write().expect("cache lock poisoned").insert(
                name.to_string(),
                Entry {
                    value: present,
                    expires_at: Instant::now() + ttl,
                },
            );
        }
    }

    /// Drop every cached entry for `name`, in both families. Called after
    /// any write to the key, so a read never observes a value from before
    /// the write.
    pub(crate) fn invalidate(&self, name: &str) {
        if self.ttls.is_some() {
            self.data.write().expect("cache lock poisoned").remove(name);
            self.exists
                .write()
                .expect("cache lock poisoned")
                .remove(name);
        }
    }

    /// Drop everything.
    pub(crate) fn clear(&self) {
        if self.ttls.is_some() {
            self.data.write().expect("cache lock poisoned").clear();
            self.exists.write().expect("cache lock poisoned").clear();
        }
    }
}

impl std::fmt::Debug for ReadCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReadCache")
            .field("enabled", &self.is_enabled())
            .finish()
    }
}
