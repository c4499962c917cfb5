//! Table-level caller that drives the cache protocol.
//!
//! `CachedTable` pairs a row store with an optional cache. Work happens
//! through a [`TableTransaction`], which holds an exclusive borrow of the
//! table from `begin` until `commit` or `rollback`, so two transactions can
//! never touch the same cache at once.

use std::sync::Arc;

use tessera_core::{
    CacheConfig, CacheKey, KeyExtractor, KeyValue, TesseraResult, Transaction,
};
use tracing::{debug, warn};

use crate::cache::{build_cache, Cache, RowStore};

/// A table whose reads and writes go through a transactional row cache.
pub struct CachedTable<R, S> {
    store: S,
    cache: Option<Box<dyn Cache<R>>>,
    extractor: KeyExtractor<R>,
}

impl<R: 'static, S: RowStore<R>> CachedTable<R, S> {
    /// Build the table with the cache described by `config`.
    pub fn new(store: S, extractor: KeyExtractor<R>, config: &CacheConfig) -> TesseraResult<Self> {
        config.validate()?;
        let cache = build_cache(config, extractor.clone());
        Ok(Self {
            store,
            cache,
            extractor,
        })
    }

    /// Build the table around an already constructed cache.
    pub fn with_cache(store: S, extractor: KeyExtractor<R>, cache: Box<dyn Cache<R>>) -> Self {
        Self {
            store,
            cache: Some(cache),
            extractor,
        }
    }

    /// A table that always goes straight to the store.
    pub fn uncached(store: S, extractor: KeyExtractor<R>) -> Self {
        Self {
            store,
            cache: None,
            extractor,
        }
    }
}

impl<R, S: RowStore<R>> CachedTable<R, S> {
    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn cache(&self) -> Option<&dyn Cache<R>> {
        self.cache.as_deref()
    }

    pub fn cache_mut(&mut self) -> Option<&mut (dyn Cache<R> + 'static)> {
        self.cache.as_deref_mut()
    }

    pub fn extractor(&self) -> &KeyExtractor<R> {
        &self.extractor
    }

    /// Start a transaction on the store and the cache.
    pub fn begin(&mut self) -> TesseraResult<TableTransaction<'_, R, S>> {
        let transaction = Transaction::new();
        self.store.begin()?;
        if let Some(cache) = self.cache.as_mut() {
            if let Err(err) = cache.begin(&transaction) {
                self.store.rollback()?;
                return Err(err.into());
            }
        }

        debug!(
            table = %self.store.name(),
            transaction = %transaction.id(),
            "table transaction begun"
        );
        Ok(TableTransaction {
            table: self,
            transaction,
            finished: false,
        })
    }
}

/// One open transaction on a [`CachedTable`].
///
/// Dropping it without calling `commit` rolls it back.
pub struct TableTransaction<'a, R, S: RowStore<R>> {
    table: &'a mut CachedTable<R, S>,
    transaction: Transaction,
    finished: bool,
}

impl<R, S: RowStore<R>> TableTransaction<'_, R, S> {
    pub fn transaction(&self) -> &Transaction {
        &self.transaction
    }

    /// The table's cache as seen from inside this transaction.
    pub fn cache(&self) -> Option<&dyn Cache<R>> {
        self.table.cache.as_deref()
    }

    /// Select by primary-key values in declaration order.
    pub fn select(&mut self, values: Vec<KeyValue>) -> TesseraResult<Option<Arc<R>>> {
        let key = self.table.extractor.key_from_values(values)?;
        self.select_key(&key)
    }

    pub fn select_key(&mut self, key: &CacheKey) -> TesseraResult<Option<Arc<R>>> {
        let table = &mut *self.table;
        let Some(cache) = table.cache.as_mut() else {
            return Ok(table.store.select(key)?.map(Arc::new));
        };

        if let Some(row) = cache.select(key)? {
            return Ok(Some(row));
        }
        let fetched = table.store.select(key)?.map(Arc::new);
        Ok(cache.selected(fetched)?)
    }

    pub fn insert(&mut self, row: impl Into<Arc<R>>) -> TesseraResult<Arc<R>> {
        let row = row.into();
        let table = &mut *self.table;
        match table.cache.as_mut() {
            Some(cache) => {
                if !cache.insert(Arc::clone(&row))? {
                    table.store.insert(&row)?;
                    cache.inserted(Arc::clone(&row))?;
                }
            }
            None => table.store.insert(&row)?,
        }
        Ok(row)
    }

    pub fn update(&mut self, row: impl Into<Arc<R>>) -> TesseraResult<Arc<R>> {
        let row = row.into();
        let table = &mut *self.table;
        match table.cache.as_mut() {
            Some(cache) => {
                if !cache.update(Arc::clone(&row))? {
                    if table.store.update(&row)? == 0 {
                        // the store has no such row, so the cache must not
                        // keep one either
                        cache.deleted(Arc::clone(&row))?;
                    } else {
                        cache.updated(Arc::clone(&row))?;
                    }
                }
            }
            None => {
                table.store.update(&row)?;
            }
        }
        Ok(row)
    }

    pub fn delete(&mut self, row: impl Into<Arc<R>>) -> TesseraResult<()> {
        let row = row.into();
        let table = &mut *self.table;
        match table.cache.as_mut() {
            Some(cache) => {
                if !cache.delete(Arc::clone(&row))? {
                    table.store.delete(&row)?;
                    cache.deleted(row)?;
                }
            }
            None => {
                table.store.delete(&row)?;
            }
        }
        Ok(())
    }

    pub fn save(&mut self, row: impl Into<Arc<R>>) -> TesseraResult<Arc<R>> {
        let row = row.into();
        let table = &mut *self.table;
        match table.cache.as_mut() {
            Some(cache) => {
                if !cache.save(Arc::clone(&row))? {
                    table.store.save(&row)?;
                    cache.saved(Arc::clone(&row))?;
                }
            }
            None => table.store.save(&row)?,
        }
        Ok(row)
    }

    /// Push the cache's pending writes to the store without ending the
    /// transaction.
    pub fn write(&mut self) -> TesseraResult<()> {
        let table = &mut *self.table;
        if let Some(cache) = table.cache.as_mut() {
            cache.write(&mut table.store)?;
        }
        Ok(())
    }

    /// Flush cached writes, commit the store, then fold the cache.
    ///
    /// The cache only folds after the store commit succeeded, so a failed
    /// store commit leaves the committed map as it was before the
    /// transaction.
    pub fn commit(mut self) -> TesseraResult<()> {
        self.finished = true;
        let table = &mut *self.table;

        if let Some(cache) = table.cache.as_mut() {
            if let Err(err) = cache.write(&mut table.store) {
                abandon(table, &self.transaction);
                return Err(err.into());
            }
        }

        if let Err(err) = table.store.commit() {
            warn!(
                table = %table.store.name(),
                transaction = %self.transaction.id(),
                error = %err,
                "store commit failed"
            );
            if let Some(cache) = table.cache.as_mut() {
                if let Err(rollback_err) = cache.rollback(&self.transaction) {
                    warn!(error = %rollback_err, "cache rollback after failed commit also failed");
                }
            }
            return Err(err.into());
        }

        if let Some(cache) = table.cache.as_mut() {
            cache.commit(&self.transaction, &mut table.store)?;
        }

        debug!(
            table = %table.store.name(),
            transaction = %self.transaction.id(),
            "table transaction committed"
        );
        Ok(())
    }

    /// Discard everything done in this transaction.
    pub fn rollback(mut self) -> TesseraResult<()> {
        self.finished = true;
        let table = &mut *self.table;
        let cache_result = match table.cache.as_mut() {
            Some(cache) => cache.rollback(&self.transaction),
            None => Ok(()),
        };
        let store_result = table.store.rollback();
        cache_result?;
        store_result?;

        debug!(
            table = %table.store.name(),
            transaction = %self.transaction.id(),
            "table transaction rolled back"
        );
        Ok(())
    }
}

impl<R, S: RowStore<R>> Drop for TableTransaction<'_, R, S> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        warn!(
            table = %self.table.store.name(),
            transaction = %self.transaction.id(),
            "table transaction dropped without commit, rolling back"
        );
        abandon(&mut *self.table, &self.transaction);
    }
}

/// Roll back cache and store, logging rather than returning secondary errors.
fn abandon<R, S: RowStore<R>>(table: &mut CachedTable<R, S>, transaction: &Transaction) {
    if let Some(cache) = table.cache.as_mut() {
        if let Err(err) = cache.rollback(transaction) {
            warn!(error = %err, "cache rollback failed");
        }
    }
    if let Err(err) = table.store.rollback() {
        warn!(error = %err, "store rollback failed");
    }
}
