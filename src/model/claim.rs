//! Claims: persisted surveyor-to-item assignments.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::catalog::{ItemKind, WorkItemId};
use super::payload::Payload;

/// Newtype for claim IDs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClaimId(pub Uuid);

impl ClaimId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ClaimId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ClaimId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A surveyor's claim on one work item, open until its payload is submitted.
///
/// Claims are never deleted; completed claims form the report trail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claim {
    pub id: ClaimId,
    pub work_item_id: WorkItemId,
    pub kind: ItemKind,
    pub worker_id: String,
    pub completed: bool,
    /// Store-assigned creation sequence.
    pub seq: i64,
    pub created_at: DateTime<Utc>,
}

/// One line of the catalog report: a claim and whatever was submitted for it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportRow {
    pub claim_id: ClaimId,
    pub seq: i64,
    pub worker_id: String,
    pub completed: bool,
    pub kind: ItemKind,
    pub order_key: i64,
    pub external_ref: i64,
    pub payload: Option<Payload>,
}
