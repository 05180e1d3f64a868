use crate::cache::{CacheBackend, CacheStats};
use crate::dns::{Query, enums::QueryType};
use crate::target::ResolvedTarget;
use crate::upstream::Upstream;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Decides between cache and upstream for each query.
///
/// Every collaborator failure ends in [`ResolvedTarget::NotFound`]; callers
/// always get something to answer with.
pub struct DnsResolver {
    cache: Arc<dyn CacheBackend>,
    upstream: Arc<dyn Upstream>,
    write_back: bool,
    stats: CacheStats,
}

impl std::fmt::Debug for DnsResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DnsResolver")
            .field("write_back", &self.write_back)
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

impl DnsResolver {
    pub fn new(cache: Arc<dyn CacheBackend>, upstream: Arc<dyn Upstream>) -> Self {
        Self {
            cache,
            upstream,
            write_back: false,
            stats: CacheStats::default(),
        }
    }

    /// Store successful upstream answers in the cache
    pub fn with_write_back(mut self, write_back: bool) -> Self {
        self.write_back = write_back;
        if write_back {
            info!("Upstream answers will be written back to the cache");
        }
        self
    }

    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }

    pub fn cache(&self) -> &Arc<dyn CacheBackend> {
        &self.cache
    }

    pub async fn resolve(&self, query: &Query) -> ResolvedTarget {
        match query.qtype {
            QueryType::A => self.resolve_forward(&query.domain()).await,
            QueryType::PTR => match query.reverse_address() {
                Some(address) => self.resolve_reverse(&address).await,
                None => {
                    debug!("PTR query for {} has too few labels", query.domain());
                    ResolvedTarget::NotFound
                }
            },
            QueryType::Other(qtype) => {
                debug!("No resolution for type {} query {}", qtype, query.domain());
                ResolvedTarget::NotFound
            }
        }
    }

    async fn resolve_forward(&self, domain: &str) -> ResolvedTarget {
        match self.cache.get(domain).await {
            Ok(Some(address)) => {
                self.stats.record_hit();
                debug!("Cache hit for {}: {}", domain, address);
                return ResolvedTarget::from_text(&address);
            }
            Ok(None) => {
                self.stats.record_miss();
                debug!("Cache miss for {}", domain);
            }
            Err(e) => {
                self.stats.record_error();
                debug!("Cache lookup for {} failed, treating as miss: {}", domain, e);
            }
        }

        match self.upstream.resolve_a(domain).await {
            Ok(addresses) => match addresses.first() {
                Some(&address) => {
                    if self.write_back {
                        self.store(domain, &address.to_string()).await;
                    }
                    ResolvedTarget::Address(address)
                }
                None => self.upstream_failed(domain, "no records"),
            },
            Err(e) => self.upstream_failed(domain, &e.to_string()),
        }
    }

    async fn resolve_reverse(&self, address: &str) -> ResolvedTarget {
        match self.cache.get_by_address(address).await {
            Ok(Some(domain)) => {
                self.stats.record_hit();
                debug!("Cache hit for {}: {}", address, domain);
                return ResolvedTarget::from_text(&domain);
            }
            Ok(None) => {
                self.stats.record_miss();
                debug!("{} not found in cache", address);
            }
            Err(e) => {
                self.stats.record_error();
                debug!("Reverse cache lookup for {} failed, treating as miss: {}", address, e);
            }
        }

        match self.upstream.resolve_ptr(address).await {
            Ok(domain) => {
                let target = ResolvedTarget::from_text(&domain);
                if self.write_back && !target.is_not_found() {
                    self.store(domain.trim_end_matches('.'), address).await;
                }
                target
            }
            Err(e) => self.upstream_failed(address, &e.to_string()),
        }
    }

    fn upstream_failed(&self, name: &str, reason: &str) -> ResolvedTarget {
        self.stats.record_upstream_failure();
        warn!("Upstream resolution for {} failed: {}", name, reason);
        ResolvedTarget::NotFound
    }

    async fn store(&self, domain: &str, address: &str) {
        if let Err(e) = self.cache.insert(domain, address).await {
            warn!("Failed to write {} -> {} back to cache: {}", domain, address, e);
        }
    }
}
