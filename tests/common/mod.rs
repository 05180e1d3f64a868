//! Common test utilities for bound tests

#![allow(dead_code)] // These functions are used by various test files

use async_trait::async_trait;
use bound::{
    cache::{CacheBackend, LocalCache},
    error::{ResolveError, StoreError},
    resolver::DnsResolver,
    upstream::Upstream,
};
use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Raw query bytes with the given id, name and type
pub fn create_dns_query_bytes(id: u16, domain: &str, query_type: u16) -> Vec<u8> {
    let mut packet = Vec::new();

    // Header (12 bytes)
    packet.extend_from_slice(&id.to_be_bytes()); // ID
    packet.extend_from_slice(&[0x01, 0x00]); // Flags: QR=0, OPCODE=0, RD=1
    packet.extend_from_slice(&[0x00, 0x01]); // QDCOUNT = 1
    packet.extend_from_slice(&[0x00, 0x00]); // ANCOUNT = 0
    packet.extend_from_slice(&[0x00, 0x00]); // NSCOUNT = 0
    packet.extend_from_slice(&[0x00, 0x00]); // ARCOUNT = 0

    // Question section
    for label in domain.split('.').filter(|l| !l.is_empty()) {
        packet.push(label.len() as u8);
        packet.extend_from_slice(label.as_bytes());
    }
    packet.push(0); // Root label

    packet.extend_from_slice(&query_type.to_be_bytes()); // QTYPE
    packet.extend_from_slice(&[0x00, 0x01]); // QCLASS = IN

    packet
}

/// The last `n` bytes of a response, where the answer RDATA lives
pub fn tail(bytes: &[u8], n: usize) -> &[u8] {
    &bytes[bytes.len() - n..]
}

/// Upstream with canned answers that counts how often it is asked
#[derive(Default)]
pub struct MockUpstream {
    a_answers: HashMap<String, Vec<Ipv4Addr>>,
    ptr_answers: HashMap<String, String>,
    delays: HashMap<String, Duration>,
    pub a_calls: AtomicUsize,
    pub ptr_calls: AtomicUsize,
}

impl MockUpstream {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_a(mut self, domain: &str, addresses: &[Ipv4Addr]) -> Self {
        self.a_answers.insert(domain.to_string(), addresses.to_vec());
        self
    }

    pub fn with_ptr(mut self, address: &str, domain: &str) -> Self {
        self.ptr_answers.insert(address.to_string(), domain.to_string());
        self
    }

    /// Make lookups of `name` take `delay` before answering
    pub fn with_delay(mut self, name: &str, delay: Duration) -> Self {
        self.delays.insert(name.to_string(), delay);
        self
    }

    pub fn a_calls(&self) -> usize {
        self.a_calls.load(Ordering::SeqCst)
    }

    pub fn ptr_calls(&self) -> usize {
        self.ptr_calls.load(Ordering::SeqCst)
    }

    async fn pause(&self, name: &str) {
        if let Some(delay) = self.delays.get(name) {
            tokio::time::sleep(*delay).await;
        }
    }
}

#[async_trait]
impl Upstream for MockUpstream {
    async fn resolve_a(&self, domain: &str) -> Result<Vec<Ipv4Addr>, ResolveError> {
        self.a_calls.fetch_add(1, Ordering::SeqCst);
        self.pause(domain).await;
        match self.a_answers.get(domain) {
            Some(addresses) => Ok(addresses.clone()),
            None => Err(ResolveError::NoRecords),
        }
    }

    async fn resolve_ptr(&self, address: &str) -> Result<String, ResolveError> {
        self.ptr_calls.fetch_add(1, Ordering::SeqCst);
        self.pause(address).await;
        self.ptr_answers
            .get(address)
            .cloned()
            .ok_or(ResolveError::Timeout)
    }
}

/// Cache whose every lookup fails
pub struct BrokenCache;

#[async_trait]
impl CacheBackend for BrokenCache {
    async fn get(&self, domain: &str) -> Result<Option<String>, StoreError> {
        Err(StoreError::MalformedRow {
            key: domain.to_string(),
            reason: "IP column is not text".to_string(),
        })
    }

    async fn get_by_address(&self, _address: &str) -> Result<Option<String>, StoreError> {
        Err(StoreError::Database("database is locked".to_string()))
    }

    async fn insert(&self, _domain: &str, _address: &str) -> Result<(), StoreError> {
        Err(StoreError::Database("read-only database".to_string()))
    }

    async fn len(&self) -> Result<usize, StoreError> {
        Ok(0)
    }
}

/// Resolver over a seeded local cache and the given upstream
pub fn create_test_resolver(
    entries: &[(&str, &str)],
    upstream: Arc<MockUpstream>,
) -> DnsResolver {
    let cache = LocalCache::with_entries(entries.iter().copied());
    DnsResolver::new(Arc::new(cache), upstream)
}
