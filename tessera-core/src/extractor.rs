//! Primary-key extraction for cached row types.
//!
//! A row type either implements [`PrimaryKeyed`] directly or registers a
//! closure with [`KeyExtractor::from_fn`]. Both paths go through the same
//! validation: arity must match the declared key fields and no value may
//! be null.

use std::fmt;
use std::sync::Arc;

use crate::{CacheError, CacheKey, CacheResult, KeyValue};

/// Row types that know their own primary key.
pub trait PrimaryKeyed {
    /// Name used in errors and diagnostics.
    fn row_type() -> &'static str;

    /// Declared primary-key field names, in declaration order.
    fn primary_key_fields() -> &'static [&'static str];

    /// Primary-key values, in the same order as `primary_key_fields`.
    fn primary_key_values(&self) -> Vec<KeyValue>;
}

type ExtractFn<R> = dyn Fn(&R) -> CacheResult<Vec<KeyValue>> + Send + Sync;

/// Reads the primary-key tuple of a row and turns it into a [`CacheKey`].
pub struct KeyExtractor<R> {
    row_type: String,
    fields: Vec<String>,
    extract: Arc<ExtractFn<R>>,
}

impl<R: PrimaryKeyed> KeyExtractor<R> {
    /// Build an extractor from the row type's `PrimaryKeyed` implementation.
    pub fn for_row() -> Self {
        Self {
            row_type: R::row_type().to_string(),
            fields: R::primary_key_fields().iter().map(|f| f.to_string()).collect(),
            extract: Arc::new(|row: &R| Ok(row.primary_key_values())),
        }
    }
}

impl<R> KeyExtractor<R> {
    /// Register a fallible extraction closure for a row type.
    ///
    /// Errors returned by the closure propagate unchanged from every cache
    /// call that needs the row's key.
    pub fn from_fn<F>(row_type: impl Into<String>, fields: &[&str], extract: F) -> Self
    where
        F: Fn(&R) -> CacheResult<Vec<KeyValue>> + Send + Sync + 'static,
    {
        Self {
            row_type: row_type.into(),
            fields: fields.iter().map(|f| f.to_string()).collect(),
            extract: Arc::new(extract),
        }
    }

    pub fn row_type(&self) -> &str {
        &self.row_type
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    /// Extract and validate the key of `row`.
    pub fn key_of(&self, row: &R) -> CacheResult<CacheKey> {
        let values = (self.extract)(row)?;
        self.key_from_values(values)
    }

    /// Validate raw key values against the declared key fields.
    pub fn key_from_values(&self, values: Vec<KeyValue>) -> CacheResult<CacheKey> {
        if values.len() != self.fields.len() {
            return Err(CacheError::KeyArity {
                row_type: self.row_type.clone(),
                expected: self.fields.len(),
                got: values.len(),
            });
        }

        CacheKey::new(values).map_err(|err| match err {
            CacheError::NullKeyValue { position, .. } => CacheError::NullKeyValue {
                row_type: self.row_type.clone(),
                position,
            },
            other => other,
        })
    }
}

impl<R> Clone for KeyExtractor<R> {
    fn clone(&self) -> Self {
        Self {
            row_type: self.row_type.clone(),
            fields: self.fields.clone(),
            extract: Arc::clone(&self.extract),
        }
    }
}

impl<R> fmt::Debug for KeyExtractor<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyExtractor")
            .field("row_type", &self.row_type)
            .field("fields", &self.fields)
            .finish()
    }
}
