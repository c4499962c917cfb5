//! Primary-key values and the cache key built from them.
//!
//! A `CacheKey` is an immutable tuple of primary-key values. Its hash is
//! folded once at construction (`31 * hash + element_hash`) so map lookups
//! never rehash the tuple.

use std::fmt;
use std::hash::{Hash, Hasher};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, Serializer};
use uuid::Uuid;

use crate::{CacheError, CacheResult};

/// A single scalar primary-key value.
///
/// `Null` exists so that extractors reading optional fields can report what
/// they saw; a `CacheKey` never contains it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyValue {
    Null,
    Bool(bool),
    Int(i64),
    Text(String),
    Uuid(Uuid),
    Timestamp(DateTime<Utc>),
    Bytes(Vec<u8>),
}

impl KeyValue {
    /// Returns true for `KeyValue::Null`.
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Element hash folded into the owning key's hash code.
    pub fn hash_code(&self) -> i32 {
        match self {
            Self::Null => 0,
            Self::Bool(true) => 1231,
            Self::Bool(false) => 1237,
            Self::Int(v) => fold_i64(*v),
            Self::Text(s) => s
                .encode_utf16()
                .fold(0i32, |h, unit| h.wrapping_mul(31).wrapping_add(unit as i32)),
            Self::Uuid(id) => {
                let (hi, lo) = id.as_u64_pair();
                fold_i64((hi ^ lo) as i64)
            }
            Self::Timestamp(ts) => fold_i64(ts.timestamp_millis()),
            Self::Bytes(bytes) => bytes.iter().fold(1i32, |h, b| {
                h.wrapping_mul(31).wrapping_add(*b as i8 as i32)
            }),
        }
    }
}

fn fold_i64(v: i64) -> i32 {
    (v ^ ((v as u64) >> 32) as i64) as i32
}

impl fmt::Display for KeyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "null"),
            Self::Bool(b) => write!(f, "{}", b),
            Self::Int(v) => write!(f, "{}", v),
            Self::Text(s) => write!(f, "'{}'", s),
            Self::Uuid(id) => write!(f, "{}", id),
            Self::Timestamp(ts) => write!(f, "{}", ts.to_rfc3339()),
            Self::Bytes(bytes) => write!(f, "<{} bytes>", bytes.len()),
        }
    }
}

impl From<i64> for KeyValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<i32> for KeyValue {
    fn from(v: i32) -> Self {
        Self::Int(v as i64)
    }
}

impl From<u32> for KeyValue {
    fn from(v: u32) -> Self {
        Self::Int(v as i64)
    }
}

impl From<bool> for KeyValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<&str> for KeyValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for KeyValue {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl From<Uuid> for KeyValue {
    fn from(v: Uuid) -> Self {
        Self::Uuid(v)
    }
}

impl From<DateTime<Utc>> for KeyValue {
    fn from(v: DateTime<Utc>) -> Self {
        Self::Timestamp(v)
    }
}

impl From<Vec<u8>> for KeyValue {
    fn from(v: Vec<u8>) -> Self {
        Self::Bytes(v)
    }
}

impl<T: Into<KeyValue>> From<Option<T>> for KeyValue {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Self::Null)
    }
}

/// Immutable primary-key tuple used as the map key for cached rows.
///
/// Construction is the only way in; there are no mutators.
#[derive(Clone)]
pub struct CacheKey {
    values: Box<[KeyValue]>,
    hash: i32,
}

impl CacheKey {
    /// Build a key from primary-key values in declaration order.
    ///
    /// Fails with `CacheError::NullKeyValue` if any element is `KeyValue::Null`.
    pub fn new(values: Vec<KeyValue>) -> CacheResult<Self> {
        if let Some(position) = values.iter().position(KeyValue::is_null) {
            return Err(CacheError::NullKeyValue {
                row_type: "<unknown>".to_string(),
                position,
            });
        }

        let hash = values
            .iter()
            .fold(0i32, |h, v| h.wrapping_mul(31).wrapping_add(v.hash_code()));

        Ok(Self {
            values: values.into_boxed_slice(),
            hash,
        })
    }

    /// Convenience constructor for single-column keys.
    pub fn single(value: impl Into<KeyValue>) -> CacheResult<Self> {
        Self::new(vec![value.into()])
    }

    /// The key values in declaration order.
    pub fn values(&self) -> &[KeyValue] {
        &self.values
    }

    /// Number of primary-key columns.
    pub fn arity(&self) -> usize {
        self.values.len()
    }

    /// The precomputed hash code.
    pub fn hash_code(&self) -> i32 {
        self.hash
    }
}

impl PartialEq for CacheKey {
    fn eq(&self, other: &Self) -> bool {
        self.hash == other.hash && self.values == other.values
    }
}

impl Eq for CacheKey {}

impl Hash for CacheKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_i32(self.hash);
    }
}

impl fmt::Debug for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CacheKey{}", self)
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (i, value) in self.values.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", value)?;
        }
        write!(f, ")")
    }
}

impl Serialize for CacheKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.values.iter())
    }
}
