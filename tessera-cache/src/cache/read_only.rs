//! Cache policy where the store stays authoritative for writes.
//!
//! Every write goes to the store immediately. The cache refuses authority,
//! then mirrors the confirmed result so later reads in the same transaction
//! are served from memory.

use std::sync::Arc;

use tessera_core::{CacheConfig, CacheOperation, CachePolicy, CacheResult, KeyExtractor};

use super::base::CacheCore;
use super::traits::{Cache, RowWriter};

/// Read-only cache policy.
pub struct ReadOnlyCache<R> {
    core: CacheCore<R>,
}

impl<R> ReadOnlyCache<R> {
    pub fn new(extractor: KeyExtractor<R>, config: CacheConfig) -> Self {
        Self {
            core: CacheCore::new(extractor, config),
        }
    }
}

impl<R> Cache<R> for ReadOnlyCache<R> {
    fn policy(&self) -> CachePolicy {
        CachePolicy::ReadOnly
    }

    fn core(&self) -> &CacheCore<R> {
        &self.core
    }

    fn core_mut(&mut self) -> &mut CacheCore<R> {
        &mut self.core
    }

    /// Rejects keys the cache already knows exist, so the store is never
    /// asked to insert a duplicate.
    fn insert(&mut self, row: Arc<R>) -> CacheResult<bool> {
        self.core.check(CacheOperation::Insert, row)?;
        Ok(false)
    }

    fn update(&mut self, row: Arc<R>) -> CacheResult<bool> {
        self.core.check(CacheOperation::Update, row)?;
        Ok(false)
    }

    fn delete(&mut self, row: Arc<R>) -> CacheResult<bool> {
        self.core.check(CacheOperation::Delete, row)?;
        Ok(false)
    }

    fn save(&mut self, row: Arc<R>) -> CacheResult<bool> {
        self.core.check(CacheOperation::Save, row)?;
        Ok(false)
    }

    fn inserted(&mut self, row: Arc<R>) -> CacheResult<()> {
        self.core.apply(CacheOperation::Inserted, row)
    }

    fn updated(&mut self, row: Arc<R>) -> CacheResult<()> {
        self.core.apply(CacheOperation::Updated, row)
    }

    fn deleted(&mut self, row: Arc<R>) -> CacheResult<()> {
        self.core.apply(CacheOperation::Deleted, row)
    }

    fn saved(&mut self, row: Arc<R>) -> CacheResult<()> {
        self.core.apply(CacheOperation::Saved, row)
    }

    /// Nothing is ever pending; only checks that a transaction is active.
    fn write(&mut self, _writer: &mut dyn RowWriter<R>) -> CacheResult<()> {
        self.core.require_active(CacheOperation::Write)
    }
}
