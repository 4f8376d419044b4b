//! Bounded, time-limited caches for derived artifacts.
//!
//! Caches here are advisory: a miss is always correct, and keys carry a
//! profile fingerprint (or a markup hash for templates) so an edit produces a
//! new key instead of a stale hit.

use crate::profile::ContextProfile;
use crate::value::{EntityId, Value};
use std::collections::{HashMap, VecDeque};
use std::hash::Hash;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// Default lifetime of a shaped-data entry.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(300);

/// Default number of entries kept.
pub const DEFAULT_CACHE_CAPACITY: usize = 256;

/// LRU cache whose entries also expire after a fixed lifetime.
#[derive(Debug)]
pub struct TtlCache<K, V> {
    ttl: Duration,
    inner: Mutex<TtlCacheInner<K, V>>,
}

#[derive(Debug)]
struct TtlCacheInner<K, V> {
    capacity: usize,
    map: HashMap<K, (V, Instant)>,
    order: VecDeque<K>,
}

impl<K: Eq + Hash + Clone, V: Clone> TtlCache<K, V> {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            ttl,
            inner: Mutex::new(TtlCacheInner {
                capacity,
                map: HashMap::new(),
                order: VecDeque::new(),
            }),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn get(&self, key: &K) -> Option<V> {
        let mut inner = self.lock();
        if inner.map.get(key)?.1.elapsed() >= self.ttl {
            inner.map.remove(key);
            inner.remove_from_order(key);
            return None;
        }
        let value = inner.map.get(key).map(|(v, _)| v.clone())?;
        inner.touch(key);
        Some(value)
    }

    pub fn insert(&self, key: K, value: V) {
        let mut inner = self.lock();
        if inner.map.insert(key.clone(), (value, Instant::now())).is_some() {
            inner.touch(&key);
        } else {
            inner.order.push_back(key);
        }
        inner.evict_if_needed();
    }

    pub fn remove(&self, key: &K) -> Option<V> {
        let mut inner = self.lock();
        let removed = inner.map.remove(key).map(|(v, _)| v);
        if removed.is_some() {
            inner.remove_from_order(key);
        }
        removed
    }

    /// Drop every entry whose key matches `predicate`.
    pub fn retain(&self, mut predicate: impl FnMut(&K) -> bool) {
        let mut inner = self.lock();
        inner.map.retain(|k, _| predicate(k));
        let TtlCacheInner { map, order, .. } = &mut *inner;
        order.retain(|k| map.contains_key(k));
    }

    pub fn clear(&self) {
        let mut inner = self.lock();
        inner.map.clear();
        inner.order.clear();
    }

    pub fn len(&self) -> usize {
        self.lock().map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> MutexGuard<'_, TtlCacheInner<K, V>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<K: Eq + Hash + Clone, V> TtlCacheInner<K, V> {
    fn touch(&mut self, key: &K) {
        if let Some(pos) = self.order.iter().position(|k| k == key) {
            if let Some(k) = self.order.remove(pos) {
                self.order.push_back(k);
            }
        }
    }

    fn remove_from_order(&mut self, key: &K) {
        if let Some(pos) = self.order.iter().position(|k| k == key) {
            let _ = self.order.remove(pos);
        }
    }

    fn evict_if_needed(&mut self) {
        if self.capacity == 0 {
            self.map.clear();
            self.order.clear();
            return;
        }

        while self.map.len() > self.capacity {
            let Some(oldest) = self.order.pop_front() else {
                break;
            };
            let _ = self.map.remove(&oldest);
        }
    }
}

/// Key of a shaped-data entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ShapeKey {
    pub context: String,
    pub id: EntityId,
    pub fingerprint: u64,
}

impl ShapeKey {
    pub fn new(profile: &ContextProfile, id: &EntityId) -> Self {
        Self {
            context: profile.context_name.clone(),
            id: id.clone(),
            fingerprint: profile.fingerprint(),
        }
    }
}

/// Shaped results keyed by context, entity id and profile fingerprint.
#[derive(Debug)]
pub struct ShapeCache {
    entries: TtlCache<ShapeKey, Value>,
}

impl Default for ShapeCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_CAPACITY, DEFAULT_CACHE_TTL)
    }
}

impl ShapeCache {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            entries: TtlCache::new(capacity, ttl),
        }
    }

    pub fn get(&self, profile: &ContextProfile, id: &EntityId) -> Option<Value> {
        self.entries.get(&ShapeKey::new(profile, id))
    }

    pub fn insert(&self, profile: &ContextProfile, id: &EntityId, value: Value) {
        self.entries.insert(ShapeKey::new(profile, id), value);
    }

    /// Drop every entry of one context, whatever its fingerprint.
    pub fn invalidate_context(&self, context: &str) {
        self.entries.retain(|key| key.context != context);
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
