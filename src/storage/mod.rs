//! Dedupe store abstraction
//!
//! Tracks which article ids have already been published, with TTL expiry.
//! Backends: a SQLite-backed cache and a no-op (always-unseen) variant used
//! when deduplication is turned off. Lookup and mark failures are handled
//! fail-open/fail-soft by the callers; this is a cache, not a ledger.

mod sqlite;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::error::StoreError;

pub use sqlite::SqliteStore;

/// Tracks published article ids
pub trait DedupeStore: Send + Sync {
    /// Whether a non-expired mark exists for the id
    fn seen_article(&self, id: &str) -> Result<bool, StoreError>;

    /// Mark the id as published until now + TTL
    fn mark_article(&self, id: &str) -> Result<(), StoreError>;

    /// Release the backing store
    fn close(&self) -> Result<(), StoreError>;
}

impl std::fmt::Debug for dyn DedupeStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DedupeStore").finish_non_exhaustive()
    }
}

/// Retention characteristics for concrete store implementations
#[derive(Debug, Clone, Copy)]
pub struct StoreOptions {
    pub article_ttl: Duration,
    pub cleanup_interval: Duration,
}

const DEFAULT_ARTICLE_TTL: Duration = Duration::from_secs(5 * 24 * 3600);
const DEFAULT_CLEANUP_INTERVAL: Duration = Duration::from_secs(12 * 3600);

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            article_ttl: DEFAULT_ARTICLE_TTL,
            cleanup_interval: DEFAULT_CLEANUP_INTERVAL,
        }
    }
}

impl StoreOptions {
    /// Replace non-positive values with the defaults rather than rejecting
    /// them; a mis-set cache TTL should not stop the harvester.
    fn normalize(mut self) -> Self {
        if self.article_ttl.is_zero() {
            self.article_ttl = DEFAULT_ARTICLE_TTL;
        }
        if self.cleanup_interval.is_zero() {
            self.cleanup_interval = DEFAULT_CLEANUP_INTERVAL;
        }
        self
    }
}

/// Create the configured storage backend
///
/// An empty/"none"/"disabled" type selects the no-op store; "sqlite" opens
/// the persistent cache at `path`; anything else is a construction error.
pub fn new_store(
    kind: &str,
    path: &Path,
    options: StoreOptions,
) -> Result<Arc<dyn DedupeStore>, StoreError> {
    let kind = kind.trim().to_ascii_lowercase();
    let options = options.normalize();

    match kind.as_str() {
        "" | "none" | "disabled" => Ok(Arc::new(NoopStore)),
        "sqlite" => {
            if path.as_os_str().is_empty() {
                return Err(StoreError::MissingPath);
            }
            Ok(Arc::new(SqliteStore::open(path, options)?))
        }
        other => Err(StoreError::UnsupportedType(other.to_string())),
    }
}

/// Always-unseen store used when deduplication is disabled
struct NoopStore;

impl DedupeStore for NoopStore {
    fn seen_article(&self, _id: &str) -> Result<bool, StoreError> {
        Ok(false)
    }

    fn mark_article(&self, _id: &str) -> Result<(), StoreError> {
        Ok(())
    }

    fn close(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
