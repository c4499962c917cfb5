//! Transactional row cache.
//!
//! Each table owns one cache. Inside a transaction the cache tracks rows the
//! transaction touched in an uncommitted map, separate from the committed
//! map that mirrors durable state. Commit folds the uncommitted map into the
//! committed one; rollback throws it away.
//!
//! # Policies
//!
//! - [`ReadOnlyCache`]: the store is authoritative for writes. The cache
//!   mirrors confirmed writes so later reads are served from memory.
//! - [`ReadWriteCache`]: the cache is authoritative for writes and flushes
//!   them to the store once, at commit.
//!
//! # Example
//!
//! ```ignore
//! let mut cache = build_cache(&config, KeyExtractor::<Account>::for_row())
//!     .expect("cache enabled");
//!
//! let txn = Transaction::new();
//! cache.begin(&txn)?;
//! if !cache.insert(Arc::clone(&row))? {
//!     store.insert(&row)?;
//!     cache.inserted(row)?;
//! }
//! cache.commit(&txn, &mut store)?;
//! ```

pub mod base;
pub mod read_only;
pub mod read_write;
pub mod report;
pub mod stats;
pub mod traits;
pub mod uncommitted;

pub use base::CacheCore;
pub use read_only::ReadOnlyCache;
pub use read_write::ReadWriteCache;
pub use report::CacheReport;
pub use stats::CacheStats;
pub use traits::{Cache, RowStore, RowWriter};
pub use uncommitted::{PriorDelete, RowState, UncommittedRow};

use tessera_core::{CacheConfig, CachePolicy, KeyExtractor};

/// Build the cache configured for a table, or `None` when caching is disabled.
pub fn build_cache<R: 'static>(
    config: &CacheConfig,
    extractor: KeyExtractor<R>,
) -> Option<Box<dyn Cache<R>>> {
    if !config.enabled {
        return None;
    }

    let cache: Box<dyn Cache<R>> = match config.policy {
        CachePolicy::ReadOnly => Box::new(ReadOnlyCache::new(extractor, config.clone())),
        CachePolicy::ReadWrite => Box::new(ReadWriteCache::new(extractor, config.clone())),
    };
    Some(cache)
}
