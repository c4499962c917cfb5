//! Hit and miss accounting.

use serde::Serialize;

/// Statistics about cache usage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Number of selects answered from the cache.
    pub hits: u64,
    /// Number of selects that sent the caller to the store.
    pub misses: u64,
}

impl CacheStats {
    pub fn hit(&mut self) {
        self.hits += 1;
    }

    pub fn miss(&mut self) {
        self.misses += 1;
    }

    pub fn total(&self) -> u64 {
        self.hits + self.misses
    }

    /// Hits as a whole percentage of all selects, rounded. Zero before any select.
    pub fn percent_hits(&self) -> u32 {
        let total = self.total();
        if total == 0 {
            0
        } else {
            (100.0 * self.hits as f64 / total as f64).round() as u32
        }
    }
}
