//! Result cache and in-flight request de-duplication
//!
//! Content-addressed store of request fingerprint → outcome, bounded in size
//! with insertion-order eviction. Successes and failures share the keyspace
//! and are distinguished by outcome tag. A per-fingerprint guard collapses
//! concurrent identical requests to at most one upstream call.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;

use crate::decode::ImageResult;
use crate::error::GenerationError;
use crate::request::Fingerprint;

/// Cached outcome of one canonical request
#[derive(Debug, Clone)]
pub enum Outcome {
    /// Completed generation
    Success(ImageResult),
    /// Provider-side failure, cached so identical broken requests do not hit
    /// the upstream again
    Failure(GenerationError),
}

/// One cache slot
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub outcome: Outcome,
    pub created_at: DateTime<Utc>,
}

struct CacheInner {
    entries: HashMap<Fingerprint, CacheEntry>,
    /// Insertion order, oldest first; drives eviction
    order: VecDeque<Fingerprint>,
}

/// Bounded outcome cache
///
/// When disabled, `lookup` always misses and `store` is a no-op; the
/// in-flight guards still serialize duplicate concurrent requests, but with
/// no cache to re-check each waiter then pays its own upstream call.
pub struct GenerationCache {
    enabled: bool,
    max_size: usize,
    inner: Mutex<CacheInner>,
    inflight: DashMap<Fingerprint, Arc<tokio::sync::Mutex<()>>>,
}

impl GenerationCache {
    pub fn new(enabled: bool, max_size: usize) -> Self {
        Self {
            enabled,
            max_size: max_size.max(1),
            inner: Mutex::new(CacheInner {
                entries: HashMap::new(),
                order: VecDeque::new(),
            }),
            inflight: DashMap::new(),
        }
    }

    /// Look up a cached outcome
    pub fn lookup(&self, fingerprint: &Fingerprint) -> Option<CacheEntry> {
        if !self.enabled {
            return None;
        }
        self.inner.lock().entries.get(fingerprint).cloned()
    }

    /// Insert an outcome, evicting the least-recently-inserted entry on
    /// overflow. Re-storing a fingerprint replaces the outcome without
    /// touching its eviction position.
    pub fn store(&self, fingerprint: Fingerprint, outcome: Outcome) {
        if !self.enabled {
            return;
        }
        let mut inner = self.inner.lock();
        let entry = CacheEntry {
            outcome,
            created_at: Utc::now(),
        };
        if inner.entries.insert(fingerprint, entry).is_none() {
            inner.order.push_back(fingerprint);
            if inner.order.len() > self.max_size {
                if let Some(oldest) = inner.order.pop_front() {
                    inner.entries.remove(&oldest);
                    tracing::debug!("cache full, evicted {}", oldest);
                }
            }
        }
    }

    /// Number of cached outcomes
    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// The in-flight guard for a fingerprint.
    ///
    /// The broker locks this guard around its miss path: the first caller in
    /// wins and performs the upstream call, later callers block on the same
    /// guard and re-check the cache once it is released.
    pub fn inflight_guard(&self, fingerprint: Fingerprint) -> Arc<tokio::sync::Mutex<()>> {
        self.inflight
            .entry(fingerprint)
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }

    /// Drop the guard registration once the outcome is committed. Waiters
    /// already holding the Arc still serialize on it and then hit the cache.
    pub fn release_inflight(&self, fingerprint: &Fingerprint) {
        self.inflight.remove(fingerprint);
    }
}
