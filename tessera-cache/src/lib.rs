//! Tessera Cache - Transactional Row Cache
//!
//! Per-table cache that keeps rows touched by the active transaction apart
//! from rows known to be committed, and reconciles the two on commit or
//! rollback. The table-level driver and an in-memory row store live here
//! too, so the whole protocol can be exercised without a database.

pub mod cache;
pub mod store;
pub mod table;

pub use cache::{
    build_cache, Cache, CacheCore, CacheReport, CacheStats, ReadOnlyCache, ReadWriteCache,
    PriorDelete, RowState, RowStore, RowWriter, UncommittedRow,
};
pub use store::{InMemoryRowStore, StoreCounters};
pub use table::{CachedTable, TableTransaction};

// Re-export core types for convenience
pub use tessera_core::{
    CacheConfig, CacheError, CacheKey, CacheOperation, CachePolicy, CacheResult, ConfigError,
    IllegalStateReason, KeyExtractor, KeyValue, PrimaryKeyed, StoreError, StoreResult,
    TesseraError, TesseraResult, Transaction,
};
