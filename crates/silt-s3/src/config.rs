use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default lifetime of positive cache entries.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_millis(10_000);

/// Default lifetime of negative (not-found) cache entries. Shorter than the
/// positive TTL: absence is more likely to change soon.
pub const DEFAULT_NOT_FOUND_CACHE_TTL: Duration = Duration::from_millis(2_000);

/// Configuration for an [`S3Datastore`](crate::S3Datastore).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct S3DatastoreConfig {
    /// Path prefix inside the bucket for all objects of this store. Empty
    /// means the bucket root. Leading/trailing separators are normalized
    /// away.
    pub path: String,

    /// Create the bucket when a write or `open` finds it missing.
    pub create_if_missing: bool,

    /// Memoize get/has results instead of re-asking the remote store.
    pub cache_enabled: bool,

    /// Lifetime of positive cache entries. Must be non-zero when the cache
    /// is enabled.
    pub cache_ttl: Duration,

    /// Lifetime of negative (not-found) cache entries. Must be non-zero
    /// when the cache is enabled.
    pub not_found_cache_ttl: Duration,

    /// Report `has` as `false` on an access-denied probe instead of
    /// propagating the error.
    ///
    /// Off by default: bucket policies without list permission make a
    /// missing object indistinguishable from a forbidden one, but silently
    /// reporting "absent" for a permission problem can mask
    /// misconfiguration. Enable only for buckets known to use such
    /// policies.
    pub treat_forbidden_as_missing: bool,
}

impl Default for S3DatastoreConfig {
    fn default() -> Self {
        S3DatastoreConfig {
            path: String::new(),
            create_if_missing: false,
            cache_enabled: false,
            cache_ttl: DEFAULT_CACHE_TTL,
            not_found_cache_ttl: DEFAULT_NOT_FOUND_CACHE_TTL,
            treat_forbidden_as_missing: false,
        }
    }
}

impl S3DatastoreConfig {
    /// A default configuration rooted at `path`.
    pub fn at(path: &str) -> Self {
        S3DatastoreConfig {
            path: path.to_string(),
            ..Self::default()
        }
    }

    /// Check the configuration for values the store cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cache_enabled {
            if self.cache_ttl.is_zero() {
                return Err(ConfigError::ZeroCacheTtl);
            }
            if self.not_found_cache_ttl.is_zero() {
                return Err(ConfigError::ZeroNotFoundCacheTtl);
            }
        }
        Ok(())
    }
}

/// Rejected configuration values.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("cache_ttl must be greater than zero when the cache is enabled")]
    ZeroCacheTtl,

    #[error("not_found_cache_ttl must be greater than zero when the cache is enabled")]
    ZeroNotFoundCacheTtl,
}
