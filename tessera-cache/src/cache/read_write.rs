//! Cache policy where the cache is authoritative for writes.
//!
//! Inserts, updates, deletes and saves are held in the uncommitted map and
//! reach the store exactly once, when the transaction commits (or when
//! `write` is called directly). Confirmations are a contract violation:
//! the caller was told not to touch the store.

use std::sync::Arc;

use tessera_core::{
    CacheConfig, CacheError, CacheOperation, CachePolicy, CacheResult, KeyExtractor,
};

use super::base::CacheCore;
use super::traits::{Cache, RowWriter};

/// Read-write cache policy.
pub struct ReadWriteCache<R> {
    core: CacheCore<R>,
}

impl<R> ReadWriteCache<R> {
    pub fn new(extractor: KeyExtractor<R>, config: CacheConfig) -> Self {
        Self {
            core: CacheCore::new(extractor, config),
        }
    }

    fn claim(&mut self, operation: CacheOperation, row: Arc<R>) -> CacheResult<bool> {
        self.core.apply(operation, row)?;
        Ok(true)
    }

    fn reject_confirmation(&self, operation: CacheOperation, row: &R) -> CacheResult<()> {
        self.core.require_active(operation)?;
        Err(CacheError::IllegalOperation {
            operation,
            key: self.core.key_of(row)?,
            reason: "read-write cache holds this write; the store must not be written directly"
                .to_string(),
        })
    }
}

impl<R> Cache<R> for ReadWriteCache<R> {
    fn policy(&self) -> CachePolicy {
        CachePolicy::ReadWrite
    }

    fn core(&self) -> &CacheCore<R> {
        &self.core
    }

    fn core_mut(&mut self) -> &mut CacheCore<R> {
        &mut self.core
    }

    fn insert(&mut self, row: Arc<R>) -> CacheResult<bool> {
        self.claim(CacheOperation::Insert, row)
    }

    fn update(&mut self, row: Arc<R>) -> CacheResult<bool> {
        self.claim(CacheOperation::Update, row)
    }

    fn delete(&mut self, row: Arc<R>) -> CacheResult<bool> {
        self.claim(CacheOperation::Delete, row)
    }

    fn save(&mut self, row: Arc<R>) -> CacheResult<bool> {
        self.claim(CacheOperation::Save, row)
    }

    fn inserted(&mut self, row: Arc<R>) -> CacheResult<()> {
        self.reject_confirmation(CacheOperation::Inserted, &row)
    }

    fn updated(&mut self, row: Arc<R>) -> CacheResult<()> {
        self.reject_confirmation(CacheOperation::Updated, &row)
    }

    fn deleted(&mut self, row: Arc<R>) -> CacheResult<()> {
        self.reject_confirmation(CacheOperation::Deleted, &row)
    }

    fn saved(&mut self, row: Arc<R>) -> CacheResult<()> {
        self.reject_confirmation(CacheOperation::Saved, &row)
    }

    fn write(&mut self, writer: &mut dyn RowWriter<R>) -> CacheResult<()> {
        self.core.flush(writer)
    }
}
