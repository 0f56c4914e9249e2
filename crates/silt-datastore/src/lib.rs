//! Pluggable key-value storage for content-addressed repositories.
//!
//! A repository composes several storage areas -- root metadata, block
//! storage, pin sets, peer keys -- each served by an interchangeable
//! [`Datastore`] backend. This crate defines that contract: the normalized
//! hierarchical [`Key`], the CRUD + enumeration + batch operations, the
//! cooperative [`RepoLock`], and the closed [`DatastoreError`] taxonomy every
//! backend translates its own failures into.
//!
//! # Backends
//!
//! - [`InMemoryDatastore`] -- BTreeMap-based store for tests and embedding
//! - `silt-s3` -- adapter over an S3-compatible bucket (separate crate)
//!
//! # Design Rules
//!
//! 1. Keys are always handled in normal form; ordering is byte-wise on it.
//! 2. Values are opaque byte sequences, never interpreted by a backend.
//! 3. Backends surface only the closed error taxonomy; anything
//!    unrecognized becomes `UnknownBackend`.
//! 4. Operations suspend only at remote-call boundaries; no backend owns
//!    background work.
//! 5. Enumeration is lazy, restartable per call, and abortable between
//!    pages.
//! 6. Held repo locks are tracked process-wide and drained by one shutdown
//!    hook, never by per-lock signal handlers.

pub mod error;
pub mod key;
pub mod lock;
pub mod memory;
pub mod query;
pub mod traits;

// Re-export primary types at crate root for ergonomic imports.
pub use error::{DatastoreError, DatastoreResult};
pub use key::Key;
pub use lock::{release_locks_on_shutdown, LockCloser, LockGuard, LockRegistry, RepoLock};
pub use memory::InMemoryDatastore;
pub use query::{AbortSignal, Pair, Query, QueryOptions, QueryStream};
pub use traits::{Batch, Datastore};
