//! Tessera Test Utilities
//!
//! Shared test infrastructure for the Tessera workspace:
//! - An `Account` fixture row type with a composite primary key
//! - Proptest generators for row operations
//! - Tracing initialisation for tests

use std::sync::Once;

use chrono::{DateTime, TimeZone, Utc};
use proptest::prelude::*;
use serde::{Deserialize, Serialize};

// Re-export core types for convenience
pub use tessera_core::{
    CacheConfig, CacheError, CacheKey, CachePolicy, KeyExtractor, KeyValue, PrimaryKeyed,
    Transaction,
};

// ============================================================================
// FIXTURES
// ============================================================================

/// Fixture row keyed by `(branch, number)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub branch: String,
    pub number: i64,
    pub owner: String,
    pub balance: i64,
    pub opened_at: DateTime<Utc>,
}

impl Account {
    pub fn new(branch: impl Into<String>, number: i64, balance: i64) -> Self {
        Self {
            branch: branch.into(),
            number,
            owner: format!("owner-{}", number),
            balance,
            opened_at: fixed_timestamp(),
        }
    }

    /// Same account with a different balance.
    pub fn with_balance(&self, balance: i64) -> Self {
        Self {
            balance,
            ..self.clone()
        }
    }

    pub fn key(&self) -> CacheKey {
        account_key(&self.branch, self.number)
    }

    pub fn key_values(&self) -> Vec<KeyValue> {
        self.primary_key_values()
    }
}

impl PrimaryKeyed for Account {
    fn row_type() -> &'static str {
        "Account"
    }

    fn primary_key_fields() -> &'static [&'static str] {
        &["branch", "number"]
    }

    fn primary_key_values(&self) -> Vec<KeyValue> {
        vec![KeyValue::from(self.branch.as_str()), KeyValue::Int(self.number)]
    }
}

/// Key of the account `(branch, number)`.
pub fn account_key(branch: &str, number: i64) -> CacheKey {
    match CacheKey::new(vec![KeyValue::from(branch), KeyValue::Int(number)]) {
        Ok(key) => key,
        Err(err) => panic!("fixture key must be valid: {}", err),
    }
}

/// Extractor for the `Account` fixture.
pub fn account_extractor() -> KeyExtractor<Account> {
    KeyExtractor::for_row()
}

/// Deterministic timestamp so fixtures compare equal across runs.
pub fn fixed_timestamp() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0)
        .single()
        .unwrap_or(DateTime::UNIX_EPOCH)
}

// ============================================================================
// TRACING
// ============================================================================

static TRACING: Once = Once::new();

/// Install a test-friendly tracing subscriber once per process.
///
/// Honors `RUST_LOG`; silent by default.
pub fn init_test_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

// ============================================================================
// GENERATORS
// ============================================================================

/// An operation a table can issue inside a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowOp {
    Select(i64),
    Insert(i64, i64),
    Update(i64, i64),
    Delete(i64),
    Save(i64, i64),
    /// Flush pending cache writes without ending the transaction.
    Write,
}

/// Strategy for one operation against a small key pool, so generated
/// operations collide on keys.
pub fn arb_row_op() -> impl Strategy<Value = RowOp> {
    let number = 0i64..6;
    let balance = 0i64..1_000;
    prop_oneof![
        3 => number.clone().prop_map(RowOp::Select),
        3 => (number.clone(), balance.clone()).prop_map(|(n, b)| RowOp::Insert(n, b)),
        3 => (number.clone(), balance.clone()).prop_map(|(n, b)| RowOp::Update(n, b)),
        3 => number.clone().prop_map(RowOp::Delete),
        3 => (number, balance).prop_map(|(n, b)| RowOp::Save(n, b)),
        1 => Just(RowOp::Write),
    ]
}

/// Strategy for a transaction's worth of operations.
pub fn arb_row_ops(max_len: usize) -> impl Strategy<Value = Vec<RowOp>> {
    proptest::collection::vec(arb_row_op(), 0..max_len)
}
