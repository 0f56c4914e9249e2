//! S3-compatible object storage backend for the silt datastore interface.
//!
//! Exposes a remote bucket as an ordered key-value [`Datastore`]: keys map
//! to object names under a configured path prefix, values are object
//! bodies, and enumeration walks the bucket's paginated listing behind a
//! lazy stream. A repository composes this backend for any of its storage
//! areas (root metadata, blocks, pin sets, peer keys).
//!
//! # Pieces
//!
//! - [`S3Datastore`] -- the datastore facade (CRUD, query, batch, lifecycle)
//! - [`S3Lock`] -- cooperative repo lock built on a sentinel object
//! - [`ObjectClient`] -- the narrow interface to the remote service
//! - [`AwsObjectClient`] -- `aws-sdk-s3` implementation
//! - [`InMemoryObjectClient`] -- in-memory fake for tests and embedding
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use silt_datastore::{Datastore, Key};
//! use silt_s3::{AwsObjectClient, S3Datastore, S3DatastoreConfig};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let client = Arc::new(AwsObjectClient::from_env("my-bucket").await);
//! let store = S3Datastore::new(client, S3DatastoreConfig::at("/my-repo"))?;
//! store.open().await?;
//! store.put(&Key::new("/hello"), "world".into()).await?;
//! # Ok(())
//! # }
//! ```
//!
//! [`Datastore`]: silt_datastore::Datastore

pub mod aws;
pub mod batch;
mod cache;
pub mod client;
pub mod config;
mod list;
pub mod lock;
pub mod memory;
pub mod path;
pub mod store;

// Re-export primary types at crate root for ergonomic imports.
pub use aws::AwsObjectClient;
pub use batch::S3Batch;
pub use client::{ClientError, ClientResult, ObjectClient, ObjectPage};
pub use config::{
    ConfigError, S3DatastoreConfig, DEFAULT_CACHE_TTL, DEFAULT_NOT_FOUND_CACHE_TTL,
};
pub use lock::S3Lock;
pub use memory::InMemoryObjectClient;
pub use path::StorePath;
pub use store::S3Datastore;
