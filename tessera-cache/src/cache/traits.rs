//! Cache contract and the store seams it writes through.
//!
//! This module defines the trait every cache policy implements and the
//! traits a table's backing store must implement so the cache can flush
//! pending writes into it.

use std::sync::Arc;

use tessera_core::{
    CacheKey, CacheOperation, CachePolicy, CacheResult, StoreResult, Transaction,
};

use super::base::CacheCore;
use super::report::CacheReport;
use super::stats::CacheStats;

/// Write half of a row store, used by caches to flush pending rows.
pub trait RowWriter<R> {
    /// Insert a new row. Fails if the key already exists.
    fn insert(&mut self, row: &R) -> StoreResult<()>;

    /// Update an existing row, returning the number of rows affected.
    fn update(&mut self, row: &R) -> StoreResult<u64>;

    /// Delete a row, returning the number of rows affected.
    fn delete(&mut self, row: &R) -> StoreResult<u64>;

    /// Insert-or-update.
    ///
    /// The default tries an update and inserts when nothing was updated.
    fn save(&mut self, row: &R) -> StoreResult<()> {
        if self.update(row)? == 0 {
            self.insert(row)?;
        }
        Ok(())
    }
}

/// A transactional row store backing one table.
pub trait RowStore<R>: RowWriter<R> {
    /// Table name used in errors and diagnostics.
    fn name(&self) -> &str;

    /// Fetch the committed-or-transaction-local row for `key`.
    fn select(&mut self, key: &CacheKey) -> StoreResult<Option<R>>;

    fn begin(&mut self) -> StoreResult<()>;

    fn commit(&mut self) -> StoreResult<()>;

    fn rollback(&mut self) -> StoreResult<()>;
}

/// Per-table transactional row cache.
///
/// The authority methods (`insert`, `update`, `delete`, `save`) return
/// `true` when the cache takes responsibility for the write and the caller
/// must skip the store. When they return `false` the caller writes to the
/// store and then reports the result through the matching confirmation
/// (`inserted`, `updated`, `deleted`, `saved`).
///
/// `select` returning `None` means the caller must query the store and pass
/// the result to `selected`, which returns the row the caller should use.
///
/// Row operations require an active transaction and fail with
/// `CacheError::IllegalState` otherwise. `contains`, eviction, statistics
/// and `log` work at any time.
pub trait Cache<R> {
    fn policy(&self) -> CachePolicy;

    /// Shared maps and bookkeeping.
    fn core(&self) -> &CacheCore<R>;

    fn core_mut(&mut self) -> &mut CacheCore<R>;

    /// Start tracking a transaction. Fails if one is already active.
    fn begin(&mut self, transaction: &Transaction) -> CacheResult<()> {
        self.core_mut().begin(transaction)
    }

    /// Flush pending writes, fold the uncommitted map into the committed
    /// map, and end the transaction.
    ///
    /// If the flush fails the transaction stays active so the caller can
    /// roll it back.
    fn commit(
        &mut self,
        transaction: &Transaction,
        writer: &mut dyn RowWriter<R>,
    ) -> CacheResult<()> {
        self.core()
            .check_transaction(transaction, CacheOperation::Commit)?;
        if let Err(err) = self.write(writer) {
            tracing::warn!(
                row_type = %self.core().row_type(),
                transaction = %transaction.id(),
                error = %err,
                "cache flush failed during commit"
            );
            return Err(err);
        }
        self.core_mut().commit(transaction)
    }

    /// Discard the uncommitted map without writing anything.
    fn rollback(&mut self, transaction: &Transaction) -> CacheResult<()> {
        self.core_mut().rollback(transaction)
    }

    /// True if the key is present in either map, including keys pending
    /// deletion.
    fn contains(&self, key: &CacheKey) -> bool {
        self.core().contains(key)
    }

    /// Row visible to the active transaction, or `None` if the caller must
    /// consult the store.
    fn select(&mut self, key: &CacheKey) -> CacheResult<Option<Arc<R>>> {
        self.core_mut().select(key)
    }

    /// Record a row fetched from the store and return the row the caller
    /// should use, which may be a newer uncommitted version or `None` if
    /// the key is pending deletion.
    fn selected(&mut self, row: Option<Arc<R>>) -> CacheResult<Option<Arc<R>>> {
        self.core_mut().selected(row)
    }

    fn insert(&mut self, row: Arc<R>) -> CacheResult<bool>;

    fn update(&mut self, row: Arc<R>) -> CacheResult<bool>;

    fn delete(&mut self, row: Arc<R>) -> CacheResult<bool>;

    fn save(&mut self, row: Arc<R>) -> CacheResult<bool>;

    fn inserted(&mut self, row: Arc<R>) -> CacheResult<()>;

    fn updated(&mut self, row: Arc<R>) -> CacheResult<()>;

    fn deleted(&mut self, row: Arc<R>) -> CacheResult<()>;

    fn saved(&mut self, row: Arc<R>) -> CacheResult<()>;

    /// Flush pending uncommitted writes to the store.
    fn write(&mut self, writer: &mut dyn RowWriter<R>) -> CacheResult<()>;

    /// Drop a row from the committed map, and from the uncommitted map if it
    /// was only read.
    fn evict(&mut self, row: &R) -> CacheResult<()> {
        self.core_mut().evict(row)
    }

    /// Drop every committed row and every unmodified uncommitted row.
    fn evict_all(&mut self) {
        self.core_mut().evict_all()
    }

    fn stats(&self) -> CacheStats {
        self.core().stats()
    }

    fn hits(&self) -> u64 {
        self.core().stats().hits
    }

    fn misses(&self) -> u64 {
        self.core().stats().misses
    }

    fn percent_hits(&self) -> u32 {
        self.core().stats().percent_hits()
    }

    /// Emit a diagnostic dump of both maps and return it.
    fn log(&self) -> CacheReport {
        self.core().report(self.policy())
    }
}
