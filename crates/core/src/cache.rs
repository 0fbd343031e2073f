//! Process-wide response cache keyed by intent fingerprint.
//!
//! Entries expire after a per-intent TTL and are evicted least-recently-used beyond capacity.
//! Concurrent misses for one fingerprint share a single in-flight fetch.

use std::collections::HashMap;
use std::future::Future;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use lru::LruCache;
use serde::Serialize;
use tokio::sync::OnceCell;
use tokio::time::Instant;

use crate::config::TtlConfig;
use crate::domain::fragment::{Fragment, FragmentSource};
use crate::domain::intent::{Fingerprint, Intent};
use crate::errors::OrchestrationError;

#[derive(Clone, Debug)]
struct CacheEntry {
    fragment: Fragment,
    expires_at: Instant,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub corruptions: u64,
    pub entries: usize,
}

#[derive(Debug, Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
    corruptions: AtomicU64,
}

pub struct ResponseCache {
    entries: Mutex<LruCache<Fingerprint, CacheEntry>>,
    in_flight: Mutex<HashMap<Fingerprint, Arc<OnceCell<Fragment>>>>,
    ttl: TtlConfig,
    counters: Counters,
}

impl ResponseCache {
    pub fn new(capacity: usize, ttl: TtlConfig) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            in_flight: Mutex::new(HashMap::new()),
            ttl,
            counters: Counters::default(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.lock_entries().cap().get()
    }

    pub fn len(&self) -> usize {
        self.lock_entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            evictions: self.counters.evictions.load(Ordering::Relaxed),
            corruptions: self.counters.corruptions.load(Ordering::Relaxed),
            entries: self.len(),
        }
    }

    /// Exact-key lookup. Expired and corrupt entries are dropped and reported as a miss.
    pub fn get(&self, key: &Fingerprint) -> Option<Fragment> {
        let mut entries = self.lock_entries();
        let now = Instant::now();

        let verdict = match entries.get(key) {
            None => Lookup::Absent,
            Some(entry) if now >= entry.expires_at => Lookup::Expired,
            Some(entry) if !is_intact(key, &entry.fragment) => Lookup::Corrupt,
            Some(entry) => Lookup::Fresh(entry.fragment.clone()),
        };

        match verdict {
            Lookup::Fresh(fragment) => {
                self.counters.hits.fetch_add(1, Ordering::Relaxed);
                Some(fragment)
            }
            Lookup::Absent => {
                self.counters.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
            Lookup::Expired => {
                entries.pop(key);
                self.counters.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
            Lookup::Corrupt => {
                entries.pop(key);
                self.counters.corruptions.fetch_add(1, Ordering::Relaxed);
                self.counters.misses.fetch_add(1, Ordering::Relaxed);
                let error = OrchestrationError::CacheCorruption { fingerprint: key.to_string() };
                tracing::warn!(
                    event_name = error.event_name(),
                    fingerprint = %key,
                    "dropping corrupt cache entry; treating as miss"
                );
                None
            }
        }
    }

    /// Whether a fresh entry exists. Does not touch recency or the hit counters.
    pub fn contains(&self, key: &Fingerprint) -> bool {
        let entries = self.lock_entries();
        entries
            .peek(key)
            .is_some_and(|entry| Instant::now() < entry.expires_at && is_intact(key, &entry.fragment))
    }

    /// Stores a fragment. Failed and non-data fragments are refused.
    pub fn put(&self, key: Fingerprint, fragment: Fragment, ttl: Duration) -> bool {
        if !fragment.is_cacheable() || ttl.is_zero() {
            return false;
        }

        let entry = CacheEntry { fragment, expires_at: Instant::now() + ttl };
        let mut entries = self.lock_entries();
        if let Some((evicted, _)) = entries.push(key.clone(), entry) {
            if evicted != key {
                self.counters.evictions.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(
                    event_name = "orchestration.cache.evicted",
                    fingerprint = %evicted,
                    "evicted least recently used cache entry"
                );
            }
        }
        true
    }

    /// Returns the cached fragment for `intent`, or runs `fetch` and caches its result.
    ///
    /// At most one `fetch` runs per fingerprint at a time. Callers that arrive while a fetch is
    /// in flight wait for it and receive the same fragment, tagged as a cache result.
    pub async fn get_or_fetch<F, Fut>(&self, intent: &Intent, fetch: F) -> (Fragment, FragmentSource)
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Fragment>,
    {
        let key = intent.fingerprint();
        let ttl = self.ttl.for_intent(intent.kind);

        let cell = {
            let mut in_flight = self.lock_in_flight();
            if let Some(hit) = self.get(&key) {
                return (hit, FragmentSource::Cache);
            }
            in_flight.entry(key.clone()).or_default().clone()
        };

        let led = AtomicBool::new(false);
        let fragment = cell
            .get_or_init(|| async {
                led.store(true, Ordering::Release);
                let fragment = fetch().await;
                if let Some(ttl) = ttl {
                    self.put(key.clone(), fragment.clone(), ttl);
                }
                fragment
            })
            .await
            .clone();

        if led.load(Ordering::Acquire) {
            let mut in_flight = self.lock_in_flight();
            if in_flight.get(&key).is_some_and(|current| Arc::ptr_eq(current, &cell)) {
                in_flight.remove(&key);
            }
            (fragment, FragmentSource::Specialist)
        } else {
            (fragment, FragmentSource::Cache)
        }
    }

    /// Drops every expired entry. Returns how many were removed.
    pub fn prune_expired(&self) -> usize {
        let mut entries = self.lock_entries();
        let now = Instant::now();
        let expired = entries
            .iter()
            .filter(|(_, entry)| now >= entry.expires_at)
            .map(|(key, _)| key.clone())
            .collect::<Vec<_>>();
        for key in &expired {
            entries.pop(key);
        }
        expired.len()
    }

    pub fn clear(&self) {
        self.lock_entries().clear();
    }

    #[cfg(test)]
    fn insert_raw(&self, key: Fingerprint, fragment: Fragment, ttl: Duration) {
        self.lock_entries().push(key, CacheEntry { fragment, expires_at: Instant::now() + ttl });
    }

    fn lock_entries(&self) -> MutexGuard<'_, LruCache<Fingerprint, CacheEntry>> {
        match self.entries.lock() {
            Ok(entries) => entries,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn lock_in_flight(&self) -> MutexGuard<'_, HashMap<Fingerprint, Arc<OnceCell<Fragment>>>> {
        match self.in_flight.lock() {
            Ok(in_flight) => in_flight,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

enum Lookup {
    Absent,
    Expired,
    Corrupt,
    Fresh(Fragment),
}

fn is_intact(key: &Fingerprint, fragment: &Fragment) -> bool {
    fragment.is_cacheable() && fragment.intent.fingerprint() == *key
}
