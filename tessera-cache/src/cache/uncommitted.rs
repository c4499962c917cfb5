//! Per-key state of a row touched inside the active transaction.
//!
//! Each variant describes the net effect the transaction will have on one
//! key. A second operation on the same key never mutates the entry in place;
//! it produces a [`Transition`] that the cache applies only after every
//! check has passed.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use tessera_core::{CacheError, CacheKey, CacheOperation, CacheResult};

use super::traits::RowWriter;

/// Net effect of the active transaction on one key.
#[derive(Debug)]
pub enum UncommittedRow<R> {
    /// Read but not modified.
    Select(Arc<R>),
    /// New row pending creation, possibly following a delete of the same key
    /// earlier in the transaction.
    Insert {
        row: Arc<R>,
        replaces: PriorDelete<R>,
    },
    /// Existing row pending modification.
    Update(Arc<R>),
    /// Row pending removal. `flushed` is set once the delete reached the store.
    Delete { row: Arc<R>, flushed: bool },
    /// Insert-or-update, resolved by the store when flushed.
    Save(Arc<R>),
}

/// Delete of the same key that an `Insert` follows.
#[derive(Debug)]
pub enum PriorDelete<R> {
    /// The key had no delete earlier in the transaction.
    Absent,
    /// The deleted row has not reached the store; flushing the insert
    /// deletes it first.
    Pending(Arc<R>),
    /// The delete already reached the store through a direct write.
    Flushed,
}

impl<R> Clone for PriorDelete<R> {
    fn clone(&self) -> Self {
        match self {
            Self::Absent => Self::Absent,
            Self::Pending(row) => Self::Pending(Arc::clone(row)),
            Self::Flushed => Self::Flushed,
        }
    }
}

impl<R> PriorDelete<R> {
    fn after(old: &Arc<R>, flushed: bool) -> Self {
        if flushed {
            Self::Flushed
        } else {
            Self::Pending(Arc::clone(old))
        }
    }
}

/// Outcome of applying an operation to a key's uncommitted state.
#[derive(Debug)]
pub(crate) enum Transition<R> {
    Replace(UncommittedRow<R>),
    Remove,
    Keep,
}

/// Variant name without payload, for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RowState {
    Select,
    Insert,
    Update,
    Delete,
    Save,
}

impl<R> Clone for UncommittedRow<R> {
    fn clone(&self) -> Self {
        match self {
            Self::Select(row) => Self::Select(Arc::clone(row)),
            Self::Insert { row, replaces } => Self::Insert {
                row: Arc::clone(row),
                replaces: replaces.clone(),
            },
            Self::Update(row) => Self::Update(Arc::clone(row)),
            Self::Delete { row, flushed } => Self::Delete {
                row: Arc::clone(row),
                flushed: *flushed,
            },
            Self::Save(row) => Self::Save(Arc::clone(row)),
        }
    }
}

impl<R> UncommittedRow<R> {
    pub fn state(&self) -> RowState {
        match self {
            Self::Select(_) => RowState::Select,
            Self::Insert { .. } => RowState::Insert,
            Self::Update(_) => RowState::Update,
            Self::Delete { .. } => RowState::Delete,
            Self::Save(_) => RowState::Save,
        }
    }

    /// The row payload most recently associated with this key.
    pub fn row(&self) -> &Arc<R> {
        match self {
            Self::Select(row) | Self::Update(row) | Self::Save(row) => row,
            Self::Insert { row, .. } | Self::Delete { row, .. } => row,
        }
    }

    /// The row a reader inside the transaction should see, `None` when the
    /// key is pending removal.
    pub fn visible_row(&self) -> Option<Arc<R>> {
        match self {
            Self::Delete { .. } => None,
            other => Some(Arc::clone(other.row())),
        }
    }

    /// True while the entry still has to reach the store.
    pub fn is_pending_write(&self) -> bool {
        match self {
            Self::Select(_) => false,
            Self::Delete { flushed, .. } => !flushed,
            _ => true,
        }
    }

    /// State for a key that has no uncommitted entry yet.
    pub(crate) fn first(
        operation: CacheOperation,
        row: Arc<R>,
        in_committed: bool,
        key: &CacheKey,
    ) -> CacheResult<Transition<R>> {
        let next = match operation {
            CacheOperation::Select | CacheOperation::Selected => Self::Select(row),
            CacheOperation::Insert | CacheOperation::Inserted => {
                if in_committed {
                    return Err(CacheError::Duplicate { key: key.clone() });
                }
                Self::Insert {
                    row,
                    replaces: PriorDelete::Absent,
                }
            }
            CacheOperation::Update | CacheOperation::Updated => Self::Update(row),
            CacheOperation::Delete | CacheOperation::Deleted => Self::Delete {
                row,
                flushed: false,
            },
            CacheOperation::Save | CacheOperation::Saved => {
                if in_committed {
                    Self::Update(row)
                } else {
                    Self::Save(row)
                }
            }
            other => return Err(not_a_row_operation(other, key)),
        };
        Ok(Transition::Replace(next))
    }

    /// State after `operation` targets a key that already has this entry.
    pub(crate) fn next(
        &self,
        operation: CacheOperation,
        row: Arc<R>,
        key: &CacheKey,
    ) -> CacheResult<Transition<R>> {
        match operation {
            CacheOperation::Insert | CacheOperation::Inserted => self.on_insert(row, key),
            CacheOperation::Update | CacheOperation::Updated => Ok(self.on_update(row)),
            CacheOperation::Delete | CacheOperation::Deleted => Ok(self.on_delete(row)),
            CacheOperation::Save | CacheOperation::Saved => Ok(self.on_save(row)),
            other => Err(not_a_row_operation(other, key)),
        }
    }

    fn on_insert(&self, row: Arc<R>, key: &CacheKey) -> CacheResult<Transition<R>> {
        match self {
            Self::Delete { row: old, flushed } => Ok(Transition::Replace(Self::Insert {
                row,
                replaces: PriorDelete::after(old, *flushed),
            })),
            _ => Err(CacheError::Duplicate { key: key.clone() }),
        }
    }

    fn on_update(&self, row: Arc<R>) -> Transition<R> {
        let next = match self {
            Self::Select(_) | Self::Update(_) => Self::Update(row),
            Self::Insert { replaces, .. } => Self::Insert {
                row,
                replaces: replaces.clone(),
            },
            Self::Save(_) => Self::Save(row),
            // updating a row slated for deletion is ignored
            Self::Delete { .. } => return Transition::Keep,
        };
        Transition::Replace(next)
    }

    fn on_delete(&self, row: Arc<R>) -> Transition<R> {
        match self {
            Self::Insert {
                replaces: PriorDelete::Absent,
                ..
            } => Transition::Remove,
            // the store no longer has the row; the pending insert is dropped
            Self::Insert {
                replaces: PriorDelete::Flushed,
                ..
            } => Transition::Replace(Self::Delete { row, flushed: true }),
            Self::Delete { flushed, .. } => Transition::Replace(Self::Delete {
                row,
                flushed: *flushed,
            }),
            _ => Transition::Replace(Self::Delete {
                row,
                flushed: false,
            }),
        }
    }

    fn on_save(&self, row: Arc<R>) -> Transition<R> {
        let next = match self {
            Self::Select(_) => Self::Update(row),
            // a pending update may target a row the store does not have
            Self::Update(_) | Self::Save(_) => Self::Save(row),
            Self::Insert { replaces, .. } => Self::Insert {
                row,
                replaces: replaces.clone(),
            },
            Self::Delete { row: old, flushed } => Self::Insert {
                row,
                replaces: PriorDelete::after(old, *flushed),
            },
        };
        Transition::Replace(next)
    }

    /// Push this entry's effect to the store.
    ///
    /// Returns the entry that replaces this one once the write succeeded, or
    /// `None` if there was nothing to write.
    pub(crate) fn flush(&self, writer: &mut dyn RowWriter<R>) -> CacheResult<Option<Self>> {
        let flushed = match self {
            Self::Select(_) | Self::Delete { flushed: true, .. } => return Ok(None),
            Self::Insert { row, replaces } => {
                if let PriorDelete::Pending(old) = replaces {
                    writer.delete(old)?;
                }
                writer.insert(row)?;
                Self::Select(Arc::clone(row))
            }
            Self::Update(row) => {
                if writer.update(row)? == 0 {
                    // nothing to update, the row does not exist
                    Self::Delete {
                        row: Arc::clone(row),
                        flushed: true,
                    }
                } else {
                    Self::Select(Arc::clone(row))
                }
            }
            Self::Save(row) => {
                writer.save(row)?;
                Self::Select(Arc::clone(row))
            }
            Self::Delete { row, flushed: false } => {
                writer.delete(row)?;
                Self::Delete {
                    row: Arc::clone(row),
                    flushed: true,
                }
            }
        };
        Ok(Some(flushed))
    }

    /// Fold this entry's effect into the committed map.
    pub(crate) fn update_committed(self, key: CacheKey, committed: &mut HashMap<CacheKey, Arc<R>>) {
        match self {
            Self::Select(row) | Self::Update(row) | Self::Save(row) => {
                committed.insert(key, row);
            }
            Self::Insert { row, .. } => {
                committed.insert(key, row);
            }
            Self::Delete { .. } => {
                committed.remove(&key);
            }
        }
    }
}

fn not_a_row_operation(operation: CacheOperation, key: &CacheKey) -> CacheError {
    CacheError::IllegalOperation {
        operation,
        key: key.clone(),
        reason: "not a row operation".to_string(),
    }
}
