//! Cooperative repository locking.
//!
//! A repo lock signals that a repository is in use by one process, so that
//! several nodes sharing one storage location do not trample each other. The
//! lock is advisory: backends implement it with whatever exclusion primitive
//! their storage offers (a sentinel object, a lock file).
//!
//! Held locks are tracked in a process-wide [`LockRegistry`]. The owning
//! process installs ONE shutdown hook (see [`release_locks_on_shutdown`])
//! that drains the registry on termination; lock instances never install
//! signal handlers of their own, so repeated lock/unlock cycles do not
//! accumulate handlers.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, OnceLock};

use async_trait::async_trait;
use tracing::{info, warn};

use crate::error::DatastoreResult;
use crate::key::Key;

/// Releases a held lock. Implementations must tolerate the underlying
/// exclusion marker already being gone.
#[async_trait]
pub trait LockCloser: Send + Sync {
    /// Release the lock. Idempotent against an already-released marker.
    async fn close(&self) -> DatastoreResult<()>;
}

/// A mutual-exclusion lock over a repository scope.
#[async_trait]
pub trait RepoLock: Send + Sync {
    /// Acquire the lock for `scope`.
    ///
    /// Fails with [`DatastoreError::AlreadyLocked`](crate::DatastoreError::AlreadyLocked)
    /// when the scope is held by anyone else, and also when the existence
    /// probe itself fails: ambiguity is treated as contention, not
    /// availability.
    async fn lock(&self, scope: &Key) -> DatastoreResult<LockGuard>;

    /// Check whether `scope` is currently locked.
    ///
    /// A probe failure propagates; callers cannot distinguish "locked" from
    /// "cannot determine" and must fail closed.
    async fn locked(&self, scope: &Key) -> DatastoreResult<bool>;
}

/// Token for a successfully acquired lock.
///
/// Closing the guard deregisters it and releases the underlying lock. A
/// guard dropped without `close` stays registered and is released by the
/// shutdown hook.
pub struct LockGuard {
    closer: Arc<dyn LockCloser>,
    registration: Option<(&'static LockRegistry, u64)>,
}

impl LockGuard {
    /// Wrap a closer and register it in the global [`LockRegistry`].
    pub fn registered(closer: Arc<dyn LockCloser>) -> Self {
        let registry = LockRegistry::global();
        let id = registry.register(Arc::clone(&closer));
        LockGuard {
            closer,
            registration: Some((registry, id)),
        }
    }

    /// Wrap a closer without registering it anywhere.
    pub fn unregistered(closer: Arc<dyn LockCloser>) -> Self {
        LockGuard {
            closer,
            registration: None,
        }
    }

    /// Release the lock and deregister it from shutdown tracking.
    pub async fn close(self) -> DatastoreResult<()> {
        if let Some((registry, id)) = self.registration {
            registry.deregister(id);
        }
        self.closer.close().await
    }
}

impl std::fmt::Debug for LockGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LockGuard")
            .field("registered", &self.registration.is_some())
            .finish()
    }
}

/// Process-wide tracking of held locks.
///
/// Acquisition registers a closer, release deregisters it, and
/// [`LockRegistry::release_all`] drains whatever is still held when the
/// process shuts down.
pub struct LockRegistry {
    held: Mutex<HashMap<u64, Arc<dyn LockCloser>>>,
    next_id: AtomicU64,
}

impl LockRegistry {
    /// A fresh, empty registry. Production code uses [`LockRegistry::global`];
    /// this exists so tests can track locks in isolation.
    pub fn new() -> Self {
        LockRegistry {
            held: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(0),
        }
    }

    /// The process-wide registry.
    pub fn global() -> &'static LockRegistry {
        static GLOBAL: OnceLock<LockRegistry> = OnceLock::new();
        GLOBAL.get_or_init(LockRegistry::new)
    }

    /// Track a held lock. Returns an id for [`LockRegistry::deregister`].
    pub fn register(&self, closer: Arc<dyn LockCloser>) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.held
            .lock()
            .expect("lock registry poisoned")
            .insert(id, closer);
        id
    }

    /// Stop tracking a lock. Returns `false` if the id was unknown.
    pub fn deregister(&self, id: u64) -> bool {
        self.held
            .lock()
            .expect("lock registry poisoned")
            .remove(&id)
            .is_some()
    }

    /// Number of locks currently tracked.
    pub fn held_count(&self) -> usize {
        self.held.lock().expect("lock registry poisoned").len()
    }

    /// Release every tracked lock, best-effort.
    ///
    /// Failures are logged and do not stop the remaining releases.
    pub async fn release_all(&self) {
        let drained: Vec<(u64, Arc<dyn LockCloser>)> = {
            let mut held = self.held.lock().expect("lock registry poisoned");
            held.drain().collect()
        };
        for (id, closer) in drained {
            if let Err(err) = closer.close().await {
                warn!(id, %err, "failed to release lock during shutdown");
            }
        }
    }
}

impl Default for LockRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for LockRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LockRegistry")
            .field("held_count", &self.held_count())
            .finish()
    }
}

/// Wait for a termination signal, then release every lock still held in the
/// global registry.
///
/// The owning process spawns this once; it is the single shutdown hook for
/// all lock handles acquired through [`LockGuard::registered`].
pub async fn release_locks_on_shutdown() {
    wait_for_termination().await;
    info!("termination signal received, releasing held repository locks");
    LockRegistry::global().release_all().await;
}

#[cfg(unix)]
async fn wait_for_termination() {
    use tokio::signal::unix::{signal, SignalKind};

    match signal(SignalKind::terminate()) {
        Ok(mut term) => {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {}
                _ = term.recv() => {}
            }
        }
        Err(err) => {
            warn!(%err, "SIGTERM handler unavailable, watching SIGINT only");
            let _ = tokio::signal::ctrl_c().await;
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_termination() {
    let _ = tokio::signal::ctrl_c().await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    struct CountingCloser {
        closed: AtomicUsize,
    }

    impl CountingCloser {
        fn new() -> Arc<Self> {
            Arc::new(CountingCloser {
                closed: AtomicUsize::new(0),
            })
        }

        fn close_count(&self) -> usize {
            self.closed.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl LockCloser for CountingCloser {
        async fn close(&self) -> DatastoreResult<()> {
            self.closed.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[test]
    fn register_and_deregister() {
        let registry = LockRegistry::new();
        let id = registry.register(CountingCloser::new());
        assert_eq!(registry.held_count(), 1);
        assert!(registry.deregister(id));
        assert_eq!(registry.held_count(), 0);
        assert!(!registry.deregister(id));
    }

    #[tokio::test]
    async fn release_all_closes_every_held_lock() {
        let registry = LockRegistry::new();
        let a = CountingCloser::new();
        let b = CountingCloser::new();
        registry.register(Arc::clone(&a) as Arc<dyn LockCloser>);
        registry.register(Arc::clone(&b) as Arc<dyn LockCloser>);

        registry.release_all().await;

        assert_eq!(registry.held_count(), 0);
        assert_eq!(a.close_count(), 1);
        assert_eq!(b.close_count(), 1);
    }

    #[tokio::test]
    async fn release_all_on_empty_registry_is_a_noop() {
        let registry = LockRegistry::new();
        registry.release_all().await;
        assert_eq!(registry.held_count(), 0);
    }

    #[tokio::test]
    async fn guard_close_invokes_closer() {
        let closer = CountingCloser::new();
        let guard = LockGuard::unregistered(Arc::clone(&closer) as Arc<dyn LockCloser>);
        guard.close().await.unwrap();
        assert_eq!(closer.close_count(), 1);
    }

    #[tokio::test]
    async fn registered_guard_deregisters_on_close() {
        let registry = LockRegistry::global();
        let before = registry.held_count();

        let closer = CountingCloser::new();
        let guard = LockGuard::registered(Arc::clone(&closer) as Arc<dyn LockCloser>);
        assert_eq!(registry.held_count(), before + 1);

        guard.close().await.unwrap();
        assert_eq!(registry.held_count(), before);
        assert_eq!(closer.close_count(), 1);
    }
}
