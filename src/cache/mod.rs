//! Key-value cache consulted before the upstream resolver.
//!
//! The cache is a single forward table (domain -> IPv4 address text) that can
//! also be searched by address for reverse lookups. Backends only answer
//! lookups; deciding what a miss means is the resolver's job.

pub mod local_backend;
pub mod sqlite_backend;

pub use local_backend::LocalCache;
pub use sqlite_backend::SqliteCache;

use crate::error::StoreError;
use async_trait::async_trait;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Trait for cache backends
#[async_trait]
pub trait CacheBackend: Send + Sync {
    /// Address stored for `domain`, if any
    async fn get(&self, domain: &str) -> Result<Option<String>, StoreError>;

    /// Domain stored for `address`, if any
    async fn get_by_address(&self, address: &str) -> Result<Option<String>, StoreError>;

    /// Insert or replace the address for `domain`
    async fn insert(&self, domain: &str, address: &str) -> Result<(), StoreError>;

    /// Get the number of entries
    async fn len(&self) -> Result<usize, StoreError>;

    /// Check if cache is empty
    async fn is_empty(&self) -> Result<bool, StoreError> {
        Ok(self.len().await? == 0)
    }

    /// Release any held resources
    async fn close(&self) {}
}

/// Lookup counters shared by the resolver
#[derive(Debug, Default)]
pub struct CacheStats {
    hits: AtomicU64,
    misses: AtomicU64,
    errors: AtomicU64,
    upstream_failures: AtomicU64,
}

impl CacheStats {
    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_upstream_failure(&self) {
        self.upstream_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    pub fn errors(&self) -> u64 {
        self.errors.load(Ordering::Relaxed)
    }

    pub fn upstream_failures(&self) -> u64 {
        self.upstream_failures.load(Ordering::Relaxed)
    }

    pub fn hit_rate(&self) -> f64 {
        let hits = self.hits();
        let total = hits + self.misses();
        if total == 0 {
            0.0
        } else {
            hits as f64 / total as f64
        }
    }
}

impl fmt::Display for CacheStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "hits={}, misses={}, errors={}, upstream_failures={}, hit_rate={:.1}%",
            self.hits(),
            self.misses(),
            self.errors(),
            self.upstream_failures(),
            self.hit_rate() * 100.0
        )
    }
}

/// Lower-case and strip a trailing dot; lookups are case-insensitive
pub(crate) fn normalize_domain(domain: &str) -> String {
    domain.trim_end_matches('.').to_lowercase()
}
