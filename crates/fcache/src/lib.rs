//! # Fcache
//!
//! A single-entry cache for the most recently fetched feature.
//!
//! Consumers of a vector layer frequently ask for the same feature several
//! times in a row (once per geometry part, once for attributes, ...). Decoding
//! a feature from the external source is the expensive step, so the last
//! decoded feature is kept together with its identifier and returned as long
//! as the next request names the same identifier.
//!
//! ## Key properties
//! - **Capacity one**: a miss unconditionally evicts the previous entry.
//! - **Exact match**: a hit requires the requested identifier to equal the
//!   cached one; there is no range or prefix matching.
//! - **Explicit emptiness**: an empty cache holds no entry at all rather than
//!   a sentinel identifier.
//!
//! ## Example
//! ```rust
//! use fcache::FeatureCache;
//!
//! let mut cache: FeatureCache<String> = FeatureCache::new();
//! let mut fetches = 0;
//! for _ in 0..3 {
//!     let v = cache
//!         .get_or_fetch(7, |id| {
//!             fetches += 1;
//!             Ok::<_, ()>(format!("feature {}", id))
//!         })
//!         .unwrap();
//!     assert_eq!(v, "feature 7");
//! }
//! assert_eq!(fetches, 1);
//! ```

use tracing::trace;

/// Hit/miss counters, useful to assert how often the source was touched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
}

/// Memoizes exactly one `(identifier, value)` pair.
#[derive(Debug)]
pub struct FeatureCache<T> {
    entry: Option<(u64, T)>,
    stats: CacheStats,
}

impl<T> FeatureCache<T> {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self {
            entry: None,
            stats: CacheStats::default(),
        }
    }

    /// Returns the cached value if `id` matches the cached identifier.
    ///
    /// Does not count towards [`stats`](Self::stats).
    pub fn get(&self, id: u64) -> Option<&T> {
        match &self.entry {
            Some((cached, value)) if *cached == id => Some(value),
            _ => None,
        }
    }

    /// Returns the value for `id`, calling `fetch` only on a miss.
    ///
    /// On a miss the previous entry is dropped before `fetch` runs, so a
    /// failed fetch leaves the cache empty rather than holding a value for a
    /// different identifier.
    ///
    /// # Errors
    ///
    /// Propagates the error returned by `fetch`.
    pub fn get_or_fetch<E, F>(&mut self, id: u64, fetch: F) -> Result<&T, E>
    where
        F: FnOnce(u64) -> Result<T, E>,
    {
        let entry = match self.entry.take() {
            Some((cached, value)) if cached == id => {
                self.stats.hits += 1;
                trace!(id, "feature cache hit");
                (cached, value)
            }
            previous => {
                self.stats.misses += 1;
                trace!(id, previous = ?previous.as_ref().map(|(p, _)| *p), "feature cache miss");
                drop(previous);
                (id, fetch(id)?)
            }
        };
        Ok(&self.entry.insert(entry).1)
    }

    /// Stores `value` under `id`, evicting whatever was cached.
    pub fn insert(&mut self, id: u64, value: T) {
        self.entry = Some((id, value));
    }

    /// Identifier of the cached value, `None` when empty.
    pub fn cached_id(&self) -> Option<u64> {
        self.entry.as_ref().map(|(id, _)| *id)
    }

    pub fn is_empty(&self) -> bool {
        self.entry.is_none()
    }

    /// Drops the cached entry. Statistics are kept.
    pub fn clear(&mut self) {
        self.entry = None;
    }

    pub fn stats(&self) -> CacheStats {
        self.stats
    }
}

impl<T> Default for FeatureCache<T> {
    fn default() -> Self {
        Self::new()
    }
}
