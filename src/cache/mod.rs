//! TTL-bounded caches shared by all pipeline runs.
//!
//! Three independent caches live in [`CacheManager`]:
//! - DNS answers (domain → IP)
//! - CDN verdicts (domain → [`CdnResult`])
//! - full detection results (domain → [`DetectionResult`])
//!
//! Each cache is a [`TtlCache`] backed by a `DashMap`, so concurrent workers
//! only contend on individual shards, never on a global lock. An entry is a hit
//! while `now - inserted_at < ttl`. When an insertion pushes the cache past its
//! capacity, expired entries are purged first and then the oldest-inserted
//! entries are evicted.

use std::hash::Hash;
use std::net::IpAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use serde::Serialize;
use tokio::time::Instant;

use crate::config::Config;
use crate::models::{CdnResult, DetectionResult};

#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    inserted_at: Instant,
}

/// Concurrent map whose entries expire after a fixed TTL.
#[derive(Debug)]
pub struct TtlCache<K, V>
where
    K: Hash + Eq,
{
    entries: DashMap<K, CacheEntry<V>>,
    ttl: Duration,
    max_size: usize,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl<K, V> TtlCache<K, V>
where
    K: Hash + Eq + Clone,
    V: Clone,
{
    pub fn new(ttl: Duration, max_size: usize) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
            max_size: max_size.max(1),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Returns a clone of the value if present and younger than the TTL.
    pub fn get(&self, key: &K) -> Option<V> {
        let hit = self
            .entries
            .get(key)
            .filter(|entry| entry.inserted_at.elapsed() < self.ttl)
            .map(|entry| entry.value.clone());
        match hit {
            Some(value) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(value)
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Inserts or atomically replaces the entry for `key`.
    pub fn put(&self, key: K, value: V) {
        let is_new = !self.entries.contains_key(&key);
        if is_new && self.entries.len() >= self.max_size {
            self.make_room();
        }
        self.entries.insert(
            key,
            CacheEntry {
                value,
                inserted_at: Instant::now(),
            },
        );
    }

    /// Drops expired entries, then the oldest ones until one slot is free.
    fn make_room(&self) {
        let ttl = self.ttl;
        self.entries
            .retain(|_, entry| entry.inserted_at.elapsed() < ttl);

        while self.entries.len() >= self.max_size {
            let oldest = self
                .entries
                .iter()
                .min_by_key(|entry| entry.inserted_at)
                .map(|entry| entry.key().clone());
            match oldest {
                Some(key) => {
                    self.entries.remove(&key);
                }
                None => break,
            }
        }
    }

    pub fn remove(&self, key: &K) {
        self.entries.remove(key);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }
}

/// Snapshot of cache sizes and the combined hit rate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CacheStats {
    pub dns_cache_size: usize,
    pub cdn_cache_size: usize,
    pub result_cache_size: usize,
    pub hit_rate: f64,
}

/// Owner of the DNS, CDN and result caches.
///
/// Disabled caches still exist but are bypassed by the accessor methods, so
/// callers never branch on configuration themselves.
#[derive(Debug)]
pub struct CacheManager {
    dns: TtlCache<String, IpAddr>,
    cdn: TtlCache<String, CdnResult>,
    results: TtlCache<String, DetectionResult>,
    dns_enabled: bool,
    cdn_enabled: bool,
    result_enabled: bool,
}

impl CacheManager {
    pub fn new(config: &Config) -> Self {
        let max_size = config.cache.max_size;
        Self {
            dns: TtlCache::new(config.concurrency.cache_ttl, max_size),
            cdn: TtlCache::new(config.concurrency.cache_ttl, max_size),
            results: TtlCache::new(config.cache.ttl, max_size),
            dns_enabled: config.cache.dns_enabled,
            cdn_enabled: config.cache.cdn_enabled,
            result_enabled: config.cache.result_enabled,
        }
    }

    pub fn get_dns(&self, domain: &str) -> Option<IpAddr> {
        if !self.dns_enabled {
            return None;
        }
        self.dns.get(&normalize_key(domain))
    }

    pub fn put_dns(&self, domain: &str, ip: IpAddr) {
        if self.dns_enabled {
            self.dns.put(normalize_key(domain), ip);
        }
    }

    pub fn get_cdn(&self, domain: &str) -> Option<CdnResult> {
        if !self.cdn_enabled {
            return None;
        }
        self.cdn.get(&normalize_key(domain))
    }

    pub fn put_cdn(&self, domain: &str, verdict: CdnResult) {
        if self.cdn_enabled {
            self.cdn.put(normalize_key(domain), verdict);
        }
    }

    pub fn get_result(&self, domain: &str) -> Option<DetectionResult> {
        if !self.result_enabled {
            return None;
        }
        self.results.get(&normalize_key(domain))
    }

    pub fn put_result(&self, domain: &str, result: DetectionResult) {
        if self.result_enabled {
            self.results.put(normalize_key(domain), result);
        }
    }

    pub fn clear(&self) {
        self.dns.clear();
        self.cdn.clear();
        self.results.clear();
    }

    pub fn stats(&self) -> CacheStats {
        let hits = self.dns.hits() + self.cdn.hits() + self.results.hits();
        let lookups = hits + self.dns.misses() + self.cdn.misses() + self.results.misses();
        CacheStats {
            dns_cache_size: self.dns.len(),
            cdn_cache_size: self.cdn.len(),
            result_cache_size: self.results.len(),
            hit_rate: if lookups == 0 {
                0.0
            } else {
                hits as f64 / lookups as f64
            },
        }
    }
}

fn normalize_key(domain: &str) -> String {
    domain.trim().trim_end_matches('.').to_ascii_lowercase()
}
