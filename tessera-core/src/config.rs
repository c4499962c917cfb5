//! Cache configuration types
//!
//! Configuration is a plain serde struct. It can be built in code, parsed
//! from JSON, or read from environment variables with defaults for anything
//! not set.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::ConfigError;

/// Which side is authoritative for writes inside a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CachePolicy {
    /// Writes go straight to the store; the cache mirrors the results.
    #[default]
    ReadOnly,
    /// The cache holds writes and flushes them to the store at commit.
    ReadWrite,
}

impl CachePolicy {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ReadOnly => "read_only",
            Self::ReadWrite => "read_write",
        }
    }
}

impl fmt::Display for CachePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CachePolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "read_only" | "readonly" => Ok(Self::ReadOnly),
            "read_write" | "readwrite" => Ok(Self::ReadWrite),
            _ => Err(ConfigError::UnknownPolicy {
                policy: s.to_string(),
            }),
        }
    }
}

/// Per-table cache configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Initial capacity hint for both row maps. Zero means no pre-sizing.
    pub size: usize,
    /// Clear both maps whenever a transaction commits or rolls back.
    #[serde(alias = "evictOnTransactionEnd")]
    pub evict_on_transaction_end: bool,
    /// When false the table bypasses the cache entirely.
    pub enabled: bool,
    pub policy: CachePolicy,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            size: 0,
            evict_on_transaction_end: false,
            enabled: true,
            policy: CachePolicy::ReadOnly,
        }
    }
}

impl CacheConfig {
    /// Upper bound on the capacity hint.
    pub const MAX_SIZE_HINT: usize = 1 << 24;

    /// Create a new cache config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the initial capacity hint.
    pub fn with_size(mut self, size: usize) -> Self {
        self.size = size;
        self
    }

    /// Enable or disable eviction at transaction end.
    pub fn with_evict_on_transaction_end(mut self, evict: bool) -> Self {
        self.evict_on_transaction_end = evict;
        self
    }

    /// Enable or disable the cache.
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Set the write policy.
    pub fn with_policy(mut self, policy: CachePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Parse and validate a JSON configuration document.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json).map_err(|e| ConfigError::Malformed {
            reason: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Create CacheConfig from environment variables.
    ///
    /// Environment variables:
    /// - `TESSERA_CACHE_SIZE`: Initial capacity hint (default: 0)
    /// - `TESSERA_CACHE_EVICT_ON_TRANSACTION_END`: "true" or "false" (default: false)
    /// - `TESSERA_CACHE_ENABLED`: "true" or "false" (default: true)
    /// - `TESSERA_CACHE_POLICY`: "read_only" or "read_write" (default: read_only)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as [`CacheConfig::from_env`], reading variables through `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let size: usize = match lookup("TESSERA_CACHE_SIZE") {
            Some(raw) => raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
                field: "size".to_string(),
                value: raw.clone(),
                reason: "expected a non-negative integer".to_string(),
            })?,
            None => defaults.size,
        };

        let evict_on_transaction_end = match lookup("TESSERA_CACHE_EVICT_ON_TRANSACTION_END") {
            Some(raw) => parse_bool("evict_on_transaction_end", &raw)?,
            None => defaults.evict_on_transaction_end,
        };

        let enabled = match lookup("TESSERA_CACHE_ENABLED") {
            Some(raw) => parse_bool("enabled", &raw)?,
            None => defaults.enabled,
        };

        let policy = match lookup("TESSERA_CACHE_POLICY") {
            Some(raw) => raw.parse()?,
            None => defaults.policy,
        };

        let config = Self {
            size,
            evict_on_transaction_end,
            enabled,
            policy,
        };
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.size > Self::MAX_SIZE_HINT {
            return Err(ConfigError::InvalidValue {
                field: "size".to_string(),
                value: self.size.to_string(),
                reason: format!("must be at most {}", Self::MAX_SIZE_HINT),
            });
        }
        Ok(())
    }
}

fn parse_bool(field: &str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            field: field.to_string(),
            value: raw.to_string(),
            reason: "expected true or false".to_string(),
        }),
    }
}
