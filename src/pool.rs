//! Resource pooling for expensively constructed objects.
//!
//! GPU-bound objects (staging frames, render targets) are costly to create,
//! so they are recycled through pools instead of being destroyed after each
//! use. Under constant demand a saturated pool performs zero constructions.
//!
//! - [`Pool`]: a single idle set with a `max_spare` high-water mark.
//! - [`MultiKeyPool`]: independent per-key idle sets; a key whose set drains
//!   to empty is removed from the map so transient shapes don't leak buckets.

use std::collections::hash_map::Entry;
use std::hash::Hash;

use log::{debug, trace};
use parking_lot::Mutex;
use rustc_hash::FxHashMap;

use crate::errors::Result;

/// Default number of idle instances a pool keeps before destroying releases.
pub const DEFAULT_MAX_SPARE: usize = 4;

// ============================================================================
// Pool
// ============================================================================

struct PoolInner<T> {
    idle: Vec<T>,
    max_spare: usize,
}

/// A cache of reusable objects of a single shape.
///
/// An object is either *in use* (owned by exactly one caller) or *idle*
/// (owned by the pool); never both. The mutex guards only the idle set, never
/// the expensive factory or GPU submission.
pub struct Pool<T> {
    inner: Mutex<PoolInner<T>>,
}

impl<T> Default for Pool<T> {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_SPARE)
    }
}

impl<T> Pool<T> {
    /// Creates a pool that keeps at most `max_spare` idle instances.
    #[must_use]
    pub fn new(max_spare: usize) -> Self {
        Self {
            inner: Mutex::new(PoolInner {
                idle: Vec::new(),
                max_spare,
            }),
        }
    }

    /// Returns an idle instance if one exists, otherwise constructs a new one
    /// via `factory`. No ordering among idle instances is guaranteed.
    ///
    /// A factory failure propagates to the caller and leaves the pool
    /// unchanged.
    pub fn acquire<F>(&self, factory: F) -> Result<T>
    where
        F: FnOnce() -> Result<T>,
    {
        if let Some(value) = self.inner.lock().idle.pop() {
            trace!("reusing pooled instance");
            return Ok(value);
        }
        debug!("pool miss, constructing new instance");
        factory()
    }

    /// Returns `value` to the idle set, or destroys it if the pool already
    /// holds `max_spare` idle instances.
    pub fn release(&self, value: T) {
        let surplus = {
            let mut inner = self.inner.lock();
            if inner.idle.len() < inner.max_spare {
                inner.idle.push(value);
                None
            } else {
                Some(value)
            }
        };
        if surplus.is_some() {
            trace!("pool at max spare count, destroying released instance");
        }
        // surplus drops here, outside the lock
    }

    /// Reconfigures the idle high-water mark, destroying any excess idle
    /// instances immediately.
    pub fn set_max_spare(&self, max_spare: usize) {
        let excess: Vec<T> = {
            let mut inner = self.inner.lock();
            inner.max_spare = max_spare;
            if inner.idle.len() > max_spare {
                inner.idle.split_off(max_spare)
            } else {
                Vec::new()
            }
        };
        drop(excess);
    }

    /// Current idle high-water mark.
    #[must_use]
    pub fn max_spare(&self) -> usize {
        self.inner.lock().max_spare
    }

    /// Number of idle instances currently held.
    #[must_use]
    pub fn spare_count(&self) -> usize {
        self.inner.lock().idle.len()
    }

    /// Destroys all idle instances.
    pub fn clear(&self) {
        let drained: Vec<T> = std::mem::take(&mut self.inner.lock().idle);
        drop(drained);
    }
}

// ============================================================================
// MultiKeyPool
// ============================================================================

struct MultiKeyInner<K, T> {
    buckets: FxHashMap<K, Vec<T>>,
    max_spare: usize,
}

/// A pool indexed by key (queue family, resource shape, ...), delegating to
/// an independent idle set per key.
///
/// Invariant: the bucket map never holds an empty idle set — the key is
/// removed as soon as its last instance is acquired, so transient shapes do
/// not grow the map without bound.
pub struct MultiKeyPool<K, T> {
    inner: Mutex<MultiKeyInner<K, T>>,
}

impl<K: Eq + Hash, T> Default for MultiKeyPool<K, T> {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_SPARE)
    }
}

impl<K: Eq + Hash, T> MultiKeyPool<K, T> {
    /// Creates a pool keeping at most `max_spare` idle instances *per key*.
    #[must_use]
    pub fn new(max_spare: usize) -> Self {
        Self {
            inner: Mutex::new(MultiKeyInner {
                buckets: FxHashMap::default(),
                max_spare,
            }),
        }
    }

    /// Returns an idle instance for `key` if one exists, otherwise constructs
    /// one via `factory`. Drains the key's bucket from the map when its last
    /// idle instance is taken.
    pub fn acquire<F>(&self, key: &K, factory: F) -> Result<T>
    where
        F: FnOnce() -> Result<T>,
    {
        {
            let mut inner = self.inner.lock();
            if let Some(bucket) = inner.buckets.get_mut(key) {
                // Buckets are non-empty by invariant.
                let value = bucket.pop();
                if bucket.is_empty() {
                    inner.buckets.remove(key);
                }
                if let Some(value) = value {
                    trace!("reusing pooled instance for key");
                    return Ok(value);
                }
            }
        }
        debug!("pool miss for key, constructing new instance");
        factory()
    }

    /// Returns `value` under `key`, or destroys it if that key already holds
    /// `max_spare` idle instances.
    pub fn release(&self, key: K, value: T) {
        let surplus = {
            let mut inner = self.inner.lock();
            let max_spare = inner.max_spare;
            match inner.buckets.entry(key) {
                Entry::Occupied(mut occupied) => {
                    if occupied.get().len() < max_spare {
                        occupied.get_mut().push(value);
                        None
                    } else {
                        Some(value)
                    }
                }
                Entry::Vacant(vacant) => {
                    if max_spare > 0 {
                        vacant.insert(vec![value]);
                        None
                    } else {
                        Some(value)
                    }
                }
            }
        };
        drop(surplus);
    }

    /// Reconfigures the per-key idle high-water mark, trimming every bucket
    /// (and dropping buckets that trim to empty).
    pub fn set_max_spare(&self, max_spare: usize) {
        let excess: Vec<T> = {
            let mut inner = self.inner.lock();
            inner.max_spare = max_spare;
            let mut excess = Vec::new();
            inner.buckets.retain(|_, bucket| {
                if bucket.len() > max_spare {
                    excess.extend(bucket.split_off(max_spare));
                }
                !bucket.is_empty()
            });
            excess
        };
        drop(excess);
    }

    /// Current per-key idle high-water mark.
    #[must_use]
    pub fn max_spare(&self) -> usize {
        self.inner.lock().max_spare
    }

    /// Number of idle instances held under `key`.
    #[must_use]
    pub fn spare_count(&self, key: &K) -> usize {
        self.inner.lock().buckets.get(key).map_or(0, Vec::len)
    }

    /// Whether any idle instance is held under `key`.
    #[must_use]
    pub fn has_key(&self, key: &K) -> bool {
        self.inner.lock().buckets.contains_key(key)
    }

    /// Number of keys with at least one idle instance.
    #[must_use]
    pub fn key_count(&self) -> usize {
        self.inner.lock().buckets.len()
    }

    /// Destroys all idle instances and their buckets.
    pub fn clear(&self) {
        let drained = std::mem::take(&mut self.inner.lock().buckets);
        drop(drained);
    }
}
