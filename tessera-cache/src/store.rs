//! In-memory transactional row store.
//!
//! Rows live in a map keyed by primary key. `begin` snapshots the map and
//! `rollback` restores the snapshot. Writes outside a transaction are
//! rejected, so tests catch a cache that flushes at the wrong time.

use std::collections::HashMap;

use tessera_core::{CacheKey, KeyExtractor, StoreError, StoreResult};

use crate::cache::{RowStore, RowWriter};

/// Counts of store calls, for asserting what reached the store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreCounters {
    pub selects: u64,
    pub inserts: u64,
    pub updates: u64,
    pub deletes: u64,
}

impl StoreCounters {
    pub fn writes(&self) -> u64 {
        self.inserts + self.updates + self.deletes
    }
}

/// Row store backed by a `HashMap`.
pub struct InMemoryRowStore<R> {
    name: String,
    extractor: KeyExtractor<R>,
    rows: HashMap<CacheKey, R>,
    snapshot: Option<HashMap<CacheKey, R>>,
    counters: StoreCounters,
}

impl<R: Clone> InMemoryRowStore<R> {
    pub fn new(name: impl Into<String>, extractor: KeyExtractor<R>) -> Self {
        Self {
            name: name.into(),
            extractor,
            rows: HashMap::new(),
            snapshot: None,
            counters: StoreCounters::default(),
        }
    }

    /// Load rows directly, bypassing transactions and counters.
    pub fn seed(&mut self, rows: impl IntoIterator<Item = R>) -> StoreResult<()> {
        for row in rows {
            let key = self.key_of(&row)?;
            self.rows.insert(key, row);
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Row as currently visible to the store, without counting a select.
    pub fn get(&self, key: &CacheKey) -> Option<&R> {
        self.rows.get(key)
    }

    pub fn counters(&self) -> StoreCounters {
        self.counters
    }

    pub fn in_transaction(&self) -> bool {
        self.snapshot.is_some()
    }

    fn key_of(&self, row: &R) -> StoreResult<CacheKey> {
        self.extractor.key_of(row).map_err(|err| StoreError::Backend {
            table: self.name.clone(),
            reason: err.to_string(),
        })
    }

    fn require_transaction(&self) -> StoreResult<()> {
        if self.snapshot.is_none() {
            return Err(StoreError::NoActiveTransaction {
                table: self.name.clone(),
            });
        }
        Ok(())
    }
}

impl<R: Clone> RowWriter<R> for InMemoryRowStore<R> {
    fn insert(&mut self, row: &R) -> StoreResult<()> {
        self.require_transaction()?;
        let key = self.key_of(row)?;
        if self.rows.contains_key(&key) {
            return Err(StoreError::DuplicateKey {
                table: self.name.clone(),
                key,
            });
        }
        self.rows.insert(key, row.clone());
        self.counters.inserts += 1;
        Ok(())
    }

    fn update(&mut self, row: &R) -> StoreResult<u64> {
        self.require_transaction()?;
        let key = self.key_of(row)?;
        self.counters.updates += 1;
        match self.rows.get_mut(&key) {
            Some(existing) => {
                *existing = row.clone();
                Ok(1)
            }
            None => Ok(0),
        }
    }

    fn delete(&mut self, row: &R) -> StoreResult<u64> {
        self.require_transaction()?;
        let key = self.key_of(row)?;
        self.counters.deletes += 1;
        Ok(u64::from(self.rows.remove(&key).is_some()))
    }
}

impl<R: Clone> RowStore<R> for InMemoryRowStore<R> {
    fn name(&self) -> &str {
        &self.name
    }

    fn select(&mut self, key: &CacheKey) -> StoreResult<Option<R>> {
        self.counters.selects += 1;
        Ok(self.rows.get(key).cloned())
    }

    fn begin(&mut self) -> StoreResult<()> {
        if self.snapshot.is_some() {
            return Err(StoreError::Backend {
                table: self.name.clone(),
                reason: "transaction already active".to_string(),
            });
        }
        self.snapshot = Some(self.rows.clone());
        Ok(())
    }

    fn commit(&mut self) -> StoreResult<()> {
        self.require_transaction()?;
        self.snapshot = None;
        Ok(())
    }

    fn rollback(&mut self) -> StoreResult<()> {
        match self.snapshot.take() {
            Some(snapshot) => {
                self.rows = snapshot;
                Ok(())
            }
            None => Err(StoreError::NoActiveTransaction {
                table: self.name.clone(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessera_core::{KeyValue, PrimaryKeyed};

    #[derive(Debug, Clone, PartialEq)]
    struct Pair {
        id: i64,
        value: i64,
    }

    impl PrimaryKeyed for Pair {
        fn row_type() -> &'static str {
            "Pair"
        }

        fn primary_key_fields() -> &'static [&'static str] {
            &["id"]
        }

        fn primary_key_values(&self) -> Vec<KeyValue> {
            vec![KeyValue::Int(self.id)]
        }
    }

    fn store() -> InMemoryRowStore<Pair> {
        InMemoryRowStore::new("pairs", KeyExtractor::for_row())
    }

    #[test]
    fn test_writes_require_transaction() {
        let mut store = store();
        let err = store.insert(&Pair { id: 1, value: 1 }).unwrap_err();
        assert!(matches!(err, StoreError::NoActiveTransaction { .. }));
    }

    #[test]
    fn test_rollback_restores_snapshot() {
        let mut store = store();
        store.seed([Pair { id: 1, value: 1 }]).unwrap();

        store.begin().unwrap();
        store.insert(&Pair { id: 2, value: 2 }).unwrap();
        store.delete(&Pair { id: 1, value: 1 }).unwrap();
        store.rollback().unwrap();

        assert_eq!(store.len(), 1);
        assert_eq!(store.get(&CacheKey::single(1).unwrap()), Some(&Pair { id: 1, value: 1 }));
    }

    #[test]
    fn test_duplicate_insert_rejected() {
        let mut store = store();
        store.begin().unwrap();
        store.insert(&Pair { id: 1, value: 1 }).unwrap();
        let err = store.insert(&Pair { id: 1, value: 2 }).unwrap_err();
        assert!(matches!(err, StoreError::DuplicateKey { .. }));
    }

    #[test]
    fn test_save_falls_back_to_insert() {
        let mut store = store();
        store.begin().unwrap();
        store.save(&Pair { id: 1, value: 1 }).unwrap();
        store.save(&Pair { id: 1, value: 2 }).unwrap();
        store.commit().unwrap();

        assert_eq!(store.get(&CacheKey::single(1).unwrap()).unwrap().value, 2);
        assert_eq!(
            store.counters(),
            StoreCounters {
                selects: 0,
                inserts: 1,
                updates: 2,
                deletes: 0,
            }
        );
    }
}
