//! Error types for Tessera operations

use crate::{CacheKey, CacheOperation};
use thiserror::Error;
use uuid::Uuid;

/// Why a cache refused to act because of its transaction state.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum IllegalStateReason {
    #[error("{operation} requires an active transaction")]
    NoActiveTransaction { operation: CacheOperation },

    #[error("transaction {active} is already active")]
    TransactionAlreadyActive { active: Uuid },

    #[error("transaction {given} is not the active transaction {active}")]
    TransactionMismatch { active: Uuid, given: Uuid },
}

/// Row store errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("Duplicate key {key} in {table}")]
    DuplicateKey { table: String, key: CacheKey },

    #[error("Row {key} not found in {table}")]
    NotFound { table: String, key: CacheKey },

    #[error("Store operation on {table} requires an active transaction")]
    NoActiveTransaction { table: String },

    #[error("Store backend failure on {table}: {reason}")]
    Backend { table: String, reason: String },
}

/// Row cache errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CacheError {
    #[error("Primary key extraction failed for {row_type}: {reason}")]
    KeyExtraction { row_type: String, reason: String },

    #[error("Primary key value at position {position} of {row_type} is null")]
    NullKeyValue { row_type: String, position: usize },

    #[error("Primary key of {row_type} has {got} values, expected {expected}")]
    KeyArity {
        row_type: String,
        expected: usize,
        got: usize,
    },

    #[error("Illegal cache state: {0}")]
    IllegalState(IllegalStateReason),

    #[error("Duplicate cache key {key}")]
    Duplicate { key: CacheKey },

    #[error("Illegal cache operation {operation} on {key}: {reason}")]
    IllegalOperation {
        operation: CacheOperation,
        key: CacheKey,
        reason: String,
    },

    #[error("Cache write failed: {0}")]
    Write(#[from] StoreError),
}

impl CacheError {
    /// Returns true for errors raised because of transaction boundary misuse.
    pub fn is_illegal_state(&self) -> bool {
        matches!(self, Self::IllegalState(_))
    }

    /// Returns true if the error reports an insert on a key already known to exist.
    pub fn is_duplicate(&self) -> bool {
        matches!(self, Self::Duplicate { .. })
    }

    /// Returns true if the caller broke the authority/confirmation contract.
    pub fn is_illegal_operation(&self) -> bool {
        matches!(self, Self::IllegalOperation { .. })
    }

    /// Error for a row operation attempted with no transaction active.
    pub fn no_transaction(operation: CacheOperation) -> Self {
        Self::IllegalState(IllegalStateReason::NoActiveTransaction { operation })
    }
}

impl From<IllegalStateReason> for CacheError {
    fn from(reason: IllegalStateReason) -> Self {
        Self::IllegalState(reason)
    }
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Unknown cache policy: {policy}")]
    UnknownPolicy { policy: String },

    #[error("Malformed cache configuration: {reason}")]
    Malformed { reason: String },
}

/// Master error type for all Tessera errors.
#[derive(Debug, Clone, Error)]
pub enum TesseraError {
    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

/// Result type alias for cache operations.
pub type CacheResult<T> = Result<T, CacheError>;

/// Result type alias for row store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Result type alias for Tessera operations.
pub type TesseraResult<T> = Result<T, TesseraError>;

// =============================================================================
// TESTS
// =============================================================================
