//! Shared skeleton behind every cache policy.
//!
//! `CacheCore` owns the committed map, the uncommitted map of the active
//! transaction, and the hit/miss counters. Policies decide which of its
//! transitions to run and whether the store or the cache is authoritative
//! for writes.

use std::collections::HashMap;
use std::sync::Arc;

use tessera_core::{
    CacheConfig, CacheError, CacheKey, CacheOperation, CachePolicy, CacheResult,
    IllegalStateReason, KeyExtractor, Transaction,
};
use tracing::{debug, info, trace};
use uuid::Uuid;

use super::report::CacheReport;
use super::stats::CacheStats;
use super::traits::RowWriter;
use super::uncommitted::{RowState, Transition, UncommittedRow};

type UncommittedMap<R> = HashMap<CacheKey, UncommittedRow<R>>;

/// Uncommitted rows of the one active transaction.
struct Pending<R> {
    transaction: Uuid,
    rows: UncommittedMap<R>,
}

/// Committed and uncommitted row maps plus statistics for one table.
pub struct CacheCore<R> {
    extractor: KeyExtractor<R>,
    config: CacheConfig,
    committed: HashMap<CacheKey, Arc<R>>,
    pending: Option<Pending<R>>,
    stats: CacheStats,
}

impl<R> CacheCore<R> {
    pub fn new(extractor: KeyExtractor<R>, config: CacheConfig) -> Self {
        Self {
            committed: HashMap::with_capacity(config.size),
            extractor,
            config,
            pending: None,
            stats: CacheStats::default(),
        }
    }

    pub fn row_type(&self) -> &str {
        self.extractor.row_type()
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn extractor(&self) -> &KeyExtractor<R> {
        &self.extractor
    }

    pub fn key_of(&self, row: &R) -> CacheResult<CacheKey> {
        self.extractor.key_of(row)
    }

    pub fn is_active(&self) -> bool {
        self.pending.is_some()
    }

    pub fn transaction_id(&self) -> Option<Uuid> {
        self.pending.as_ref().map(|p| p.transaction)
    }

    pub fn stats(&self) -> CacheStats {
        self.stats
    }

    pub fn committed_len(&self) -> usize {
        self.committed.len()
    }

    /// Number of uncommitted entries, `None` outside a transaction.
    pub fn uncommitted_len(&self) -> Option<usize> {
        self.pending.as_ref().map(|p| p.rows.len())
    }

    pub fn committed_row(&self, key: &CacheKey) -> Option<&Arc<R>> {
        self.committed.get(key)
    }

    pub fn uncommitted_state(&self, key: &CacheKey) -> Option<RowState> {
        self.pending
            .as_ref()
            .and_then(|p| p.rows.get(key))
            .map(UncommittedRow::state)
    }

    /// True if any uncommitted entry still has to reach the store.
    pub fn has_pending_writes(&self) -> bool {
        self.pending
            .as_ref()
            .is_some_and(|p| p.rows.values().any(UncommittedRow::is_pending_write))
    }

    /// Present in either map, regardless of uncommitted state.
    pub fn contains(&self, key: &CacheKey) -> bool {
        self.pending
            .as_ref()
            .is_some_and(|p| p.rows.contains_key(key))
            || self.committed.contains_key(key)
    }

    pub(crate) fn begin(&mut self, transaction: &Transaction) -> CacheResult<()> {
        if let Some(pending) = &self.pending {
            return Err(IllegalStateReason::TransactionAlreadyActive {
                active: pending.transaction,
            }
            .into());
        }

        self.pending = Some(Pending {
            transaction: transaction.id(),
            rows: HashMap::with_capacity(self.config.size),
        });
        debug!(
            row_type = %self.extractor.row_type(),
            transaction = %transaction.id(),
            "cache transaction begun"
        );
        Ok(())
    }

    pub(crate) fn check_transaction(
        &self,
        transaction: &Transaction,
        operation: CacheOperation,
    ) -> CacheResult<()> {
        match &self.pending {
            None => Err(CacheError::no_transaction(operation)),
            Some(pending) if pending.transaction != transaction.id() => {
                Err(IllegalStateReason::TransactionMismatch {
                    active: pending.transaction,
                    given: transaction.id(),
                }
                .into())
            }
            Some(_) => Ok(()),
        }
    }

    pub(crate) fn require_active(&self, operation: CacheOperation) -> CacheResult<()> {
        if self.pending.is_none() {
            return Err(CacheError::no_transaction(operation));
        }
        Ok(())
    }

    /// Fold every uncommitted entry into the committed map and end the
    /// transaction. With evict-on-transaction-end both maps are cleared
    /// instead.
    pub(crate) fn commit(&mut self, transaction: &Transaction) -> CacheResult<()> {
        self.check_transaction(transaction, CacheOperation::Commit)?;
        let Some(pending) = self.pending.take() else {
            return Err(CacheError::no_transaction(CacheOperation::Commit));
        };

        let folded = pending.rows.len();
        if self.config.evict_on_transaction_end {
            self.committed.clear();
        } else {
            for (key, entry) in pending.rows {
                entry.update_committed(key, &mut self.committed);
            }
        }

        debug!(
            row_type = %self.extractor.row_type(),
            transaction = %transaction.id(),
            folded,
            committed = self.committed.len(),
            evicted = self.config.evict_on_transaction_end,
            "cache transaction committed"
        );
        Ok(())
    }

    /// Discard the uncommitted map. The committed map is untouched unless
    /// evict-on-transaction-end is set.
    pub(crate) fn rollback(&mut self, transaction: &Transaction) -> CacheResult<()> {
        self.check_transaction(transaction, CacheOperation::Rollback)?;
        let discarded = self.pending.take().map_or(0, |p| p.rows.len());
        if self.config.evict_on_transaction_end {
            self.committed.clear();
        }

        debug!(
            row_type = %self.extractor.row_type(),
            transaction = %transaction.id(),
            discarded,
            "cache transaction rolled back"
        );
        Ok(())
    }

    /// Uncommitted entry first, then the committed map.
    pub(crate) fn select(&mut self, key: &CacheKey) -> CacheResult<Option<Arc<R>>> {
        let pending = self
            .pending
            .as_ref()
            .ok_or_else(|| CacheError::no_transaction(CacheOperation::Select))?;

        let found = match pending.rows.get(key) {
            Some(entry) => entry.visible_row(),
            None => self.committed.get(key).cloned(),
        };

        if found.is_some() {
            self.stats.hit();
            trace!(row_type = %self.extractor.row_type(), key = %key, "cache hit");
        } else {
            self.stats.miss();
            trace!(row_type = %self.extractor.row_type(), key = %key, "cache miss");
        }
        Ok(found)
    }

    pub(crate) fn selected(&mut self, row: Option<Arc<R>>) -> CacheResult<Option<Arc<R>>> {
        self.require_active(CacheOperation::Selected)?;
        let Some(row) = row else {
            return Ok(None);
        };

        let key = self.extractor.key_of(&row)?;
        let rows = rows_mut(&mut self.pending, CacheOperation::Selected)?;
        if let Some(entry) = rows.get(&key) {
            return Ok(entry.visible_row());
        }

        trace!(row_type = %self.extractor.row_type(), key = %key, "row selected into cache");
        rows.insert(key, UncommittedRow::Select(Arc::clone(&row)));
        Ok(Some(row))
    }

    /// Work out what `operation` would do to the row's key without touching
    /// either map.
    fn plan(
        &self,
        operation: CacheOperation,
        row: Arc<R>,
    ) -> CacheResult<(CacheKey, Transition<R>)> {
        let pending = self
            .pending
            .as_ref()
            .ok_or_else(|| CacheError::no_transaction(operation))?;
        let key = self.extractor.key_of(&row)?;

        let transition = match pending.rows.get(&key) {
            Some(entry) => entry.next(operation, row, &key)?,
            None => {
                let in_committed = self.committed.contains_key(&key);
                UncommittedRow::first(operation, row, in_committed, &key)?
            }
        };
        Ok((key, transition))
    }

    /// Validate `operation` against the current state, leaving both maps alone.
    pub(crate) fn check(&self, operation: CacheOperation, row: Arc<R>) -> CacheResult<()> {
        self.plan(operation, row).map(|_| ())
    }

    /// Apply `operation` to the row's uncommitted entry.
    pub(crate) fn apply(&mut self, operation: CacheOperation, row: Arc<R>) -> CacheResult<()> {
        let (key, transition) = self.plan(operation, row)?;
        let rows = rows_mut(&mut self.pending, operation)?;

        match transition {
            Transition::Replace(next) => {
                debug!(
                    row_type = %self.extractor.row_type(),
                    key = %key,
                    operation = %operation,
                    state = ?next.state(),
                    "uncommitted row transition"
                );
                rows.insert(key, next);
            }
            Transition::Remove => {
                debug!(
                    row_type = %self.extractor.row_type(),
                    key = %key,
                    operation = %operation,
                    "uncommitted row cancelled"
                );
                rows.remove(&key);
            }
            Transition::Keep => {
                trace!(
                    row_type = %self.extractor.row_type(),
                    key = %key,
                    operation = %operation,
                    "uncommitted row unchanged"
                );
            }
        }
        Ok(())
    }

    /// Write every pending entry to the store.
    ///
    /// Entries that reached the store are replaced so a later flush does
    /// not write them again. On error, entries written before the failure
    /// keep their flushed form and the rest stay pending.
    pub(crate) fn flush(&mut self, writer: &mut dyn RowWriter<R>) -> CacheResult<()> {
        let rows = rows_mut(&mut self.pending, CacheOperation::Write)?;

        let mut written = 0usize;
        for entry in rows.values_mut() {
            if let Some(flushed) = entry.flush(writer)? {
                *entry = flushed;
                written += 1;
            }
        }

        debug!(
            row_type = %self.extractor.row_type(),
            written,
            "uncommitted rows flushed"
        );
        Ok(())
    }

    pub(crate) fn evict(&mut self, row: &R) -> CacheResult<()> {
        let key = self.extractor.key_of(row)?;
        self.committed.remove(&key);
        if let Some(pending) = self.pending.as_mut() {
            if matches!(pending.rows.get(&key), Some(UncommittedRow::Select(_))) {
                pending.rows.remove(&key);
            }
        }
        debug!(row_type = %self.extractor.row_type(), key = %key, "row evicted");
        Ok(())
    }

    pub(crate) fn evict_all(&mut self) {
        let evicted = self.committed.len();
        self.committed.clear();
        if let Some(pending) = self.pending.as_mut() {
            pending
                .rows
                .retain(|_, entry| !matches!(entry, UncommittedRow::Select(_)));
        }
        debug!(row_type = %self.extractor.row_type(), evicted, "cache evicted");
    }

    pub(crate) fn report(&self, policy: CachePolicy) -> CacheReport {
        let report = CacheReport {
            row_type: self.extractor.row_type().to_string(),
            policy,
            evict_on_transaction_end: self.config.evict_on_transaction_end,
            transaction: self.transaction_id(),
            committed_keys: self.committed.keys().cloned().collect(),
            uncommitted: self.pending.as_ref().map(|p| {
                p.rows
                    .iter()
                    .map(|(key, entry)| (key.clone(), entry.state()))
                    .collect()
            }),
            pending_writes: self.has_pending_writes(),
            stats: self.stats,
            percent_hits: self.stats.percent_hits(),
        };

        info!(
            row_type = %report.row_type,
            policy = %policy,
            transaction = ?report.transaction,
            committed = report.committed_len(),
            uncommitted = ?report.uncommitted_len(),
            pending_writes = report.pending_writes,
            hits = report.stats.hits,
            misses = report.stats.misses,
            percent_hits = report.percent_hits,
            "cache state"
        );
        debug!(
            row_type = %report.row_type,
            committed_keys = %join_keys(report.committed_keys.iter()),
            uncommitted_keys = %report
                .uncommitted
                .as_ref()
                .map(|rows| join_keys(rows.iter().map(|(key, _)| key)))
                .unwrap_or_default(),
            "cache keys"
        );
        report
    }
}

fn rows_mut<R>(
    pending: &mut Option<Pending<R>>,
    operation: CacheOperation,
) -> CacheResult<&mut UncommittedMap<R>> {
    pending
        .as_mut()
        .map(|p| &mut p.rows)
        .ok_or_else(|| CacheError::no_transaction(operation))
}

fn join_keys<'a>(keys: impl Iterator<Item = &'a CacheKey>) -> String {
    keys.map(ToString::to_string).collect::<Vec<_>>().join(" ")
}
