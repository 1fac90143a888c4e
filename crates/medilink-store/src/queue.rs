//! Queue of locally-made mutations awaiting a network connection.
//!
//! Changes are appended while the client is offline and flushed in bulk to
//! the sync endpoint on reconnect. The queue itself is pure bookkeeping —
//! persistence and the flush call live in the backend. There is no eviction
//! policy; the queue grows until a flush succeeds.

use chrono::{DateTime, Utc};
use medilink_bridge::records::Resource;
use serde::{Deserialize, Serialize};

/// A single queued mutation, stamped when it entered the queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OfflineChange {
    pub resource: Resource,
    /// The mutation payload, uploaded verbatim.
    pub payload: serde_json::Value,
    pub timestamp: DateTime<Utc>,
}

/// Append-only list of changes made while disconnected.
#[derive(Debug, Default)]
pub struct OfflineQueue {
    changes: Vec<OfflineChange>,
}

impl OfflineQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds a queue from persisted changes.
    pub fn from_changes(changes: Vec<OfflineChange>) -> Self {
        Self { changes }
    }

    /// Appends a change, stamping it with the current time.
    pub fn push(&mut self, resource: Resource, payload: serde_json::Value) -> &OfflineChange {
        self.changes.push(OfflineChange {
            resource,
            payload,
            timestamp: Utc::now(),
        });
        self.changes.last().expect("pushed just above")
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    /// The queued changes, oldest first.
    pub fn changes(&self) -> &[OfflineChange] {
        &self.changes
    }

    /// Removes and returns every queued change, for a flush attempt.
    pub fn take_all(&mut self) -> Vec<OfflineChange> {
        std::mem::take(&mut self.changes)
    }

    /// Puts back changes from a failed flush, ahead of anything queued while
    /// the flush was in flight, so order is preserved.
    pub fn restore(&mut self, mut changes: Vec<OfflineChange>) {
        changes.append(&mut self.changes);
        self.changes = changes;
    }

    /// Drops every queued change without flushing. Used at logout.
    pub fn clear(&mut self) {
        self.changes.clear();
    }
}
