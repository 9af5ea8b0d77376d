//! Bounded LRU cache of parsed schemas, keyed by fingerprint.
//!
//! Decoding a stored row needs the writer's schema; this cache keeps the
//! registry off the hot path. Capacity is small and fixed (the set of
//! schema versions ever written is tiny), with explicit least-recently-used
//! eviction rather than an unbounded memoizer.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use configs_core::{ConfigResult, ConfigSchema, Fingerprint};

use crate::client::SchemaLookup;

/// Default capacity; matches the handful of schema versions a deployment
/// accumulates over years of field additions.
pub const DEFAULT_SCHEMA_CACHE_CAPACITY: usize = 32;

/// Fingerprint-to-schema cache backed by a registry lookup on miss.
pub struct SchemaCache<L> {
    lookup: L,
    capacity: usize,
    inner: Mutex<CacheInner>,
}

struct CacheInner {
    entries: HashMap<Fingerprint, Arc<ConfigSchema>>,
    /// Recency order, least recently used at the front.
    recency: VecDeque<Fingerprint>,
}

impl<L: SchemaLookup> SchemaCache<L> {
    pub fn new(lookup: L, capacity: usize) -> Self {
        Self {
            lookup,
            capacity: capacity.max(1),
            inner: Mutex::new(CacheInner {
                entries: HashMap::new(),
                recency: VecDeque::new(),
            }),
        }
    }

    /// Resolve a fingerprint to its parsed schema.
    ///
    /// The lock is never held across the registry round-trip, so concurrent
    /// misses for one fingerprint may each hit the registry; the lookup is
    /// idempotent and the first inserted schema wins.
    pub async fn resolve(&self, fingerprint: Fingerprint) -> ConfigResult<Arc<ConfigSchema>> {
        if let Some(schema) = self.cached(fingerprint) {
            return Ok(schema);
        }
        let schema = self.lookup.lookup(fingerprint).await?;
        Ok(self.insert(fingerprint, schema))
    }

    /// Number of cached schemas.
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> MutexGuard<'_, CacheInner> {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn cached(&self, fingerprint: Fingerprint) -> Option<Arc<ConfigSchema>> {
        let mut inner = self.lock();
        let schema = inner.entries.get(&fingerprint).cloned()?;
        touch(&mut inner.recency, fingerprint);
        Some(schema)
    }

    fn insert(&self, fingerprint: Fingerprint, schema: ConfigSchema) -> Arc<ConfigSchema> {
        let mut inner = self.lock();
        if let Some(existing) = inner.entries.get(&fingerprint).cloned() {
            touch(&mut inner.recency, fingerprint);
            return existing;
        }

        let schema = Arc::new(schema);
        inner.entries.insert(fingerprint, Arc::clone(&schema));
        inner.recency.push_back(fingerprint);
        while inner.entries.len() > self.capacity {
            match inner.recency.pop_front() {
                Some(oldest) => {
                    inner.entries.remove(&oldest);
                }
                None => break,
            }
        }
        schema
    }
}

fn touch(recency: &mut VecDeque<Fingerprint>, fingerprint: Fingerprint) {
    if let Some(position) = recency.iter().position(|entry| *entry == fingerprint) {
        recency.remove(position);
    }
    recency.push_back(fingerprint);
}
