use super::{CacheBackend, normalize_domain};
use crate::error::StoreError;
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;
use tracing::{debug, trace};

/// Local in-memory cache backend, indexed both ways
#[derive(Debug, Default, Clone)]
pub struct LocalCache {
    forward: Arc<DashMap<String, String>>,
    reverse: Arc<DashMap<String, String>>,
}

impl LocalCache {
    /// Create a new, empty local cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a cache pre-populated with `(domain, address)` pairs
    pub fn with_entries<'a>(entries: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        let cache = Self::new();
        for (domain, address) in entries {
            cache.put(domain, address);
        }
        debug!("Local cache seeded with {} entries", cache.forward.len());
        cache
    }

    fn put(&self, domain: &str, address: &str) {
        let domain = normalize_domain(domain);
        if let Some(old) = self.forward.insert(domain.clone(), address.to_string()) {
            // Drop the stale reverse mapping unless another name was already using it
            self.reverse.remove_if(&old, |_, owner| *owner == domain);
        }
        self.reverse.insert(address.to_string(), domain);
    }
}

#[async_trait]
impl CacheBackend for LocalCache {
    async fn get(&self, domain: &str) -> Result<Option<String>, StoreError> {
        let found = self
            .forward
            .get(&normalize_domain(domain))
            .map(|entry| entry.value().clone());
        trace!("Local cache lookup {} -> {:?}", domain, found);
        Ok(found)
    }

    async fn get_by_address(&self, address: &str) -> Result<Option<String>, StoreError> {
        let found = self.reverse.get(address).map(|entry| entry.value().clone());
        trace!("Local cache reverse lookup {} -> {:?}", address, found);
        Ok(found)
    }

    async fn insert(&self, domain: &str, address: &str) -> Result<(), StoreError> {
        self.put(domain, address);
        trace!("Cached entry locally: {} -> {}", domain, address);
        Ok(())
    }

    async fn len(&self) -> Result<usize, StoreError> {
        Ok(self.forward.len())
    }

    async fn close(&self) {
        let size = self.forward.len();
        self.forward.clear();
        self.reverse.clear();
        debug!("Cleared {} entries from local cache", size);
    }
}
