//! In-process bundle holder
//!
//! Loads a bundle at most once and hands out shared references. Retraining
//! swaps in a new `Arc`; readers holding the old one finish with it.

use super::bundle::ModelBundle;
use crate::error::Result;
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::debug;

pub struct BundleCache<M> {
    slot: RwLock<Option<Arc<ModelBundle<M>>>>,
}

impl<M> Default for BundleCache<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M> BundleCache<M> {
    pub fn new() -> Self {
        Self {
            slot: RwLock::new(None),
        }
    }

    /// Currently held bundle, without loading
    pub fn current(&self) -> Option<Arc<ModelBundle<M>>> {
        self.slot.read().clone()
    }

    pub fn is_loaded(&self) -> bool {
        self.slot.read().is_some()
    }

    /// Return the held bundle, or run `load` once and keep its result.
    /// Concurrent callers wait on the write lock instead of loading twice.
    pub fn get_or_try_load<F>(&self, load: F) -> Result<Arc<ModelBundle<M>>>
    where
        F: FnOnce() -> Result<ModelBundle<M>>,
    {
        if let Some(bundle) = self.slot.read().as_ref() {
            return Ok(Arc::clone(bundle));
        }

        let mut slot = self.slot.write();
        if let Some(bundle) = slot.as_ref() {
            return Ok(Arc::clone(bundle));
        }

        let bundle = Arc::new(load()?);
        debug!(kind = %bundle.kind(), version = bundle.version(), "Cached model bundle");
        *slot = Some(Arc::clone(&bundle));
        Ok(bundle)
    }

    /// Install a freshly published bundle unless a newer version is already
    /// held. Returns whether the bundle was installed.
    pub fn swap_if_newer(&self, bundle: Arc<ModelBundle<M>>) -> bool {
        let mut slot = self.slot.write();
        if let Some(held) = slot.as_ref() {
            if held.version() >= bundle.version() {
                debug!(
                    kind = %bundle.kind(),
                    held = held.version(),
                    offered = bundle.version(),
                    "Kept newer cached bundle"
                );
                return false;
            }
        }
        *slot = Some(bundle);
        true
    }

    /// Drop the held bundle so the next access reloads
    pub fn clear(&self) {
        self.slot.write().take();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EdumindError;
    use crate::features::LEARNING_STYLE_SCHEMA;
    use crate::preprocessing::PreprocessingStatistics;
    use crate::store::ModelKind;
    use ndarray::Array2;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn versioned(tag: u32, version: u64) -> Arc<ModelBundle<u32>> {
        let mut b = bundle(tag);
        b.header.version = version;
        Arc::new(b)
    }

    fn bundle(tag: u32) -> ModelBundle<u32> {
        let x = Array2::from_shape_fn((3, 10), |(i, j)| (i + j) as f64);
        let stats = PreprocessingStatistics::fit(&x, None, 42).unwrap();
        ModelBundle::new(ModelKind::LearningStyle, &LEARNING_STYLE_SCHEMA, stats, tag)
    }

    #[test]
    fn test_loads_once() {
        let cache = BundleCache::new();
        let loads = AtomicUsize::new(0);

        for _ in 0..3 {
            let b = cache
                .get_or_try_load(|| {
                    loads.fetch_add(1, Ordering::SeqCst);
                    Ok(bundle(1))
                })
                .unwrap();
            assert_eq!(b.model, 1);
        }
        assert_eq!(loads.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_failed_load_is_not_cached() {
        let cache: BundleCache<u32> = BundleCache::new();
        assert!(cache
            .get_or_try_load(|| Err(EdumindError::ModelNotTrained))
            .is_err());
        assert!(!cache.is_loaded());
        assert!(cache.get_or_try_load(|| Ok(bundle(2))).is_ok());
    }

    #[test]
    fn test_swap_keeps_old_readers_valid() {
        let cache = BundleCache::new();
        let old = cache.get_or_try_load(|| Ok(bundle(1))).unwrap();
        assert!(cache.swap_if_newer(versioned(2, 1)));

        assert_eq!(old.model, 1);
        assert_eq!(cache.current().map(|b| b.model), Some(2));

        cache.clear();
        assert!(cache.current().is_none());
    }

    #[test]
    fn test_older_publish_does_not_replace_newer() {
        let cache = BundleCache::new();
        assert!(cache.swap_if_newer(versioned(2, 2)));
        assert!(!cache.swap_if_newer(versioned(1, 1)));
        assert_eq!(cache.current().map(|b| b.version()), Some(2));

        assert!(cache.swap_if_newer(versioned(3, 3)));
        assert_eq!(cache.current().map(|b| b.model), Some(3));
    }

    #[test]
    fn test_concurrent_publishes_keep_highest_version() {
        let cache = BundleCache::new();
        std::thread::scope(|scope| {
            for v in (1..=16u64).rev() {
                let cache = &cache;
                scope.spawn(move || {
                    cache.swap_if_newer(versioned(v as u32, v));
                });
            }
        });
        assert_eq!(cache.current().map(|b| b.version()), Some(16));
    }
}
