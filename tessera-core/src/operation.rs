//! Names of the operations a cache can be asked to perform.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Every call on the cache contract that touches rows or transaction state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheOperation {
    Begin,
    Commit,
    Rollback,
    Select,
    Insert,
    Update,
    Delete,
    Save,
    Selected,
    Inserted,
    Updated,
    Deleted,
    Saved,
    Write,
}

impl CacheOperation {
    /// The confirmation that follows this operation when the cache declines authority.
    pub fn confirmation(self) -> Option<Self> {
        match self {
            Self::Select => Some(Self::Selected),
            Self::Insert => Some(Self::Inserted),
            Self::Update => Some(Self::Updated),
            Self::Delete => Some(Self::Deleted),
            Self::Save => Some(Self::Saved),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Begin => "begin",
            Self::Commit => "commit",
            Self::Rollback => "rollback",
            Self::Select => "select",
            Self::Insert => "insert",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::Save => "save",
            Self::Selected => "selected",
            Self::Inserted => "inserted",
            Self::Updated => "updated",
            Self::Deleted => "deleted",
            Self::Saved => "saved",
            Self::Write => "write",
        }
    }
}

impl fmt::Display for CacheOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_confirmation_pairs() {
        assert_eq!(CacheOperation::Insert.confirmation(), Some(CacheOperation::Inserted));
        assert_eq!(CacheOperation::Save.confirmation(), Some(CacheOperation::Saved));
        assert_eq!(CacheOperation::Commit.confirmation(), None);
    }

    #[test]
    fn test_serde_names() {
        let json = serde_json::to_string(&CacheOperation::Selected).unwrap();
        assert_eq!(json, "\"selected\"");
    }
}
