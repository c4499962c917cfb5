//! Opaque transaction handle passed to cache lifecycle notifications.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Handle identifying one local transaction.
///
/// UUIDv7 ids sort by creation time, so log lines order naturally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    id: Uuid,
    started_at: DateTime<Utc>,
}

impl Transaction {
    /// Start a new transaction handle.
    pub fn new() -> Self {
        Self {
            id: Uuid::now_v7(),
            started_at: Utc::now(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }
}

impl Default for Transaction {
    fn default() -> Self {
        Self::new()
    }
}
