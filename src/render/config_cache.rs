//! Cache of compatible render configurations.
//!
//! Render-configuration objects are costly to create and compatible across
//! every resource sharing one structural shape; without this cache each new
//! pooled target would force a redundant creation. Entries live as long as
//! the cache (process duration, or explicit [`ConfigCache::clear`]).

use std::sync::Arc;

use log::debug;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;

use crate::errors::Result;
use crate::gpu::{GpuBackend, RenderConfigDescriptor};

struct CacheEntry<B: GpuBackend> {
    descriptor: RenderConfigDescriptor,
    config: Arc<B::RenderConfig>,
}

/// Maps a structural descriptor to a lazily created, shared render
/// configuration.
///
/// Keyed by the descriptor's 64-bit hash, but two requests resolve to the
/// same entry only when their descriptors compare equal field-for-field —
/// the hash is an index accelerator, not a substitute for comparison.
pub struct ConfigCache<B: GpuBackend> {
    backend: Arc<B>,
    entries: Mutex<FxHashMap<u64, Vec<CacheEntry<B>>>>,
}

impl<B: GpuBackend> ConfigCache<B> {
    #[must_use]
    pub fn new(backend: Arc<B>) -> Self {
        Self {
            backend,
            entries: Mutex::new(FxHashMap::default()),
        }
    }

    /// Returns the shared configuration for `descriptor`, creating and
    /// registering one on first use.
    ///
    /// Fails with [`VidmixError::UnsupportedConfig`] when the backend cannot
    /// derive a compatible object — before anything is pooled against the
    /// descriptor.
    ///
    /// [`VidmixError::UnsupportedConfig`]: crate::VidmixError::UnsupportedConfig
    pub fn get_or_create(&self, descriptor: &RenderConfigDescriptor) -> Result<Arc<B::RenderConfig>> {
        let hash = descriptor.hash64();

        {
            let entries = self.entries.lock();
            if let Some(bucket) = entries.get(&hash) {
                for entry in bucket {
                    if entry.descriptor == *descriptor {
                        return Ok(Arc::clone(&entry.config));
                    }
                }
            }
        }

        // Created outside the lock; creation is the expensive part.
        debug!("render config cache miss, creating configuration");
        let config = Arc::new(self.backend.create_render_config(descriptor)?);

        let mut entries = self.entries.lock();
        let bucket = entries.entry(hash).or_default();
        // A concurrent creator may have raced us between the two locks.
        for entry in bucket.iter() {
            if entry.descriptor == *descriptor {
                return Ok(Arc::clone(&entry.config));
            }
        }
        bucket.push(CacheEntry {
            descriptor: descriptor.clone(),
            config: Arc::clone(&config),
        });
        Ok(config)
    }

    /// Number of cached configurations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().values().map(Vec::len).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Explicit invalidation: drops every cached entry. Configurations still
    /// referenced by live targets stay alive through their shared handles.
    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    /// The backend this cache creates configurations on.
    #[must_use]
    pub fn backend(&self) -> &Arc<B> {
        &self.backend
    }
}
