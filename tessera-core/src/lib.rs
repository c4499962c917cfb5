//! Tessera Core - Keys, Configuration, and Errors
//!
//! Leaf types shared by the row cache and every table that uses it.
//! This crate holds data types and validation only; the cache state
//! machine lives in `tessera-cache`.

pub mod config;
pub mod error;
pub mod extractor;
pub mod key;
pub mod operation;
pub mod transaction;

pub use config::{CacheConfig, CachePolicy};
pub use error::{
    CacheError, CacheResult, ConfigError, IllegalStateReason, StoreError, StoreResult,
    TesseraError, TesseraResult,
};
pub use extractor::{KeyExtractor, PrimaryKeyed};
pub use key::{CacheKey, KeyValue};
pub use operation::CacheOperation;
pub use transaction::Transaction;
