//! Diagnostic snapshot returned by `Cache::log`.

use serde::Serialize;
use tessera_core::{CacheKey, CachePolicy};
use uuid::Uuid;

use super::stats::CacheStats;
use super::uncommitted::RowState;

/// Sizes and key sets of both maps at one point in time.
#[derive(Debug, Clone, Serialize)]
pub struct CacheReport {
    pub row_type: String,
    pub policy: CachePolicy,
    pub evict_on_transaction_end: bool,
    /// Active transaction, if any.
    pub transaction: Option<Uuid>,
    pub committed_keys: Vec<CacheKey>,
    /// `None` outside a transaction.
    pub uncommitted: Option<Vec<(CacheKey, RowState)>>,
    /// True while some uncommitted entry has not reached the store.
    pub pending_writes: bool,
    pub stats: CacheStats,
    pub percent_hits: u32,
}

impl CacheReport {
    pub fn committed_len(&self) -> usize {
        self.committed_keys.len()
    }

    pub fn uncommitted_len(&self) -> Option<usize> {
        self.uncommitted.as_ref().map(Vec::len)
    }
}
