//! Change Event Types
//!
//! The value broadcast to every watcher after a user record is
//! inserted, updated or deleted.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Default capacity of a subscriber's delivery queue
pub const DEFAULT_QUEUE_CAPACITY: usize = 10;

/// Kind of mutation that produced a change event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

impl ChangeKind {
    /// Wire name of the operation
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeKind::Insert => "insert",
            ChangeKind::Update => "update",
            ChangeKind::Delete => "delete",
        }
    }
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One completed mutation on the user collection
///
/// Serialized as `{"operation_type": "insert", "id": "..."}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEvent {
    /// What happened to the record
    #[serde(rename = "operation_type")]
    pub kind: ChangeKind,
    /// Id of the affected user
    #[serde(rename = "id")]
    pub subject_id: String,
}

impl ChangeEvent {
    pub fn new(kind: ChangeKind, subject_id: impl Into<String>) -> Self {
        Self {
            kind,
            subject_id: subject_id.into(),
        }
    }

    pub fn insert(subject_id: impl Into<String>) -> Self {
        Self::new(ChangeKind::Insert, subject_id)
    }

    pub fn update(subject_id: impl Into<String>) -> Self {
        Self::new(ChangeKind::Update, subject_id)
    }

    pub fn delete(subject_id: impl Into<String>) -> Self {
        Self::new(ChangeKind::Delete, subject_id)
    }
}
