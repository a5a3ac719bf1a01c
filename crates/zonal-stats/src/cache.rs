//! LRU cache of label rasters.
//!
//! A label raster depends only on the admin layer and the spatial grid,
//! and the rasterizer settings, never on the date, so it is computed once
//! per (iso3, adm_level, grid, settings) and reused across date chunks.

use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use raster_common::{AdminLayer, GridGeometry};

use crate::error::Result;
use crate::rasterize::{LabelRaster, Rasterizer};

/// Cache key: (iso3, adm_level, grid geometry fingerprint, rasterizer settings).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LabelKey {
    pub iso3: String,
    pub adm_level: u8,
    pub grid: u64,
    pub all_touched: bool,
    /// Bit pattern of the simplification tolerance.
    pub simplify_bits: u64,
    pub fill: i64,
}

impl LabelKey {
    pub fn new(layer: &AdminLayer, grid: &GridGeometry, rasterizer: &Rasterizer) -> Self {
        Self {
            iso3: layer.iso3().to_string(),
            adm_level: layer.adm_level(),
            grid: grid.fingerprint(),
            all_touched: rasterizer.all_touched,
            simplify_bits: rasterizer.simplify_tolerance.to_bits(),
            fill: rasterizer.fill,
        }
    }
}

/// Hit/miss counters of a [`LabelCache`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
    pub evictions: u64,
}

/// Bounded LRU cache of label rasters.
pub struct LabelCache {
    cache: LruCache<LabelKey, Arc<LabelRaster>>,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl LabelCache {
    /// Create a cache holding at most `capacity` rasters (at least one).
    pub fn new(capacity: usize) -> Self {
        Self {
            cache: LruCache::new(NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN)),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    /// Look up a raster, updating LRU order.
    pub fn get(&mut self, key: &LabelKey) -> Option<Arc<LabelRaster>> {
        if let Some(raster) = self.cache.get(key) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            Some(Arc::clone(raster))
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
            None
        }
    }

    pub fn insert(&mut self, key: LabelKey, raster: Arc<LabelRaster>) {
        if let Some((evicted, _)) = self.cache.push(key.clone(), raster) {
            if evicted != key {
                self.evictions.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    /// Return the cached raster for `key`, computing and storing it on a miss.
    ///
    /// Errors from `compute` are returned and nothing is cached.
    pub fn get_or_try_insert(
        &mut self,
        key: LabelKey,
        compute: impl FnOnce() -> Result<LabelRaster>,
    ) -> Result<Arc<LabelRaster>> {
        if let Some(raster) = self.get(&key) {
            return Ok(raster);
        }
        let raster = Arc::new(compute()?);
        self.insert(key, Arc::clone(&raster));
        Ok(raster)
    }

    pub fn contains(&self, key: &LabelKey) -> bool {
        self.cache.contains(key)
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: self.cache.len(),
            evictions: self.evictions.load(Ordering::Relaxed),
        }
    }

    pub fn clear(&mut self) {
        self.cache.clear();
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ZonalError;

    fn key(iso3: &str, level: u8) -> LabelKey {
        LabelKey {
            iso3: iso3.to_string(),
            adm_level: level,
            grid: 42,
            all_touched: false,
            simplify_bits: 0.001f64.to_bits(),
            fill: -1,
        }
    }

    fn raster() -> LabelRaster {
        LabelRaster::filled(2, 2, -1)
    }

    #[test]
    fn test_compute_once() {
        let mut cache = LabelCache::new(4);
        let mut calls = 0;
        for _ in 0..3 {
            cache
                .get_or_try_insert(key("MOZ", 1), || {
                    calls += 1;
                    Ok(raster())
                })
                .unwrap();
        }
        assert_eq!(calls, 1);
        let stats = cache.stats();
        assert_eq!(stats.hits, 2);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.entries, 1);
    }

    #[test]
    fn test_lru_eviction() {
        let mut cache = LabelCache::new(2);
        cache.insert(key("AAA", 0), Arc::new(raster()));
        cache.insert(key("BBB", 0), Arc::new(raster()));
        cache.get(&key("AAA", 0));
        cache.insert(key("CCC", 0), Arc::new(raster()));

        assert!(cache.contains(&key("AAA", 0)));
        assert!(!cache.contains(&key("BBB", 0)));
        assert_eq!(cache.stats().evictions, 1);
    }

    #[test]
    fn test_failed_compute_is_not_cached() {
        let mut cache = LabelCache::new(2);
        let result = cache.get_or_try_insert(key("MOZ", 2), || Err(ZonalError::rasterize("boom")));
        assert!(result.is_err());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_rasterizer_settings_split_keys() {
        let mut cache = LabelCache::new(4);
        cache.insert(key("MOZ", 1), Arc::new(raster()));

        let touched = LabelKey {
            all_touched: true,
            ..key("MOZ", 1)
        };
        let unsimplified = LabelKey {
            simplify_bits: 0f64.to_bits(),
            ..key("MOZ", 1)
        };
        assert!(!cache.contains(&touched));
        assert!(!cache.contains(&unsimplified));
        assert!(cache.contains(&key("MOZ", 1)));
    }

    #[test]
    fn test_zero_capacity_holds_one() {
        let mut cache = LabelCache::new(0);
        cache.insert(key("AAA", 0), Arc::new(raster()));
        assert_eq!(cache.len(), 1);
    }
}
