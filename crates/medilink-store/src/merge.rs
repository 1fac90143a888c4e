//! Per-item last-writer-wins reconciliation of a server refresh against
//! local list content.
//!
//! This is not a CRDT: concurrent edits from two clients are only told apart
//! by their modification stamps, and clock skew between clients is not
//! corrected. The flags set here are consumed by the UI (conflict badges,
//! "pending" styling) and cleared whenever the server's copy wins a slot.

use medilink_bridge::records::SyncRecord;

/// Merges a server refresh into existing local content, by record id.
///
/// - Every server item is kept, in server order.
/// - A local item with no matching server id is appended and flagged
///   `local_only` — typically an optimistic record the server has not
///   confirmed yet.
/// - A local item whose `last_modified` exceeds the matching server item's
///   replaces that slot and is flagged `has_conflict`; otherwise the server
///   item wins and any stale local flags disappear with the local copy.
pub fn merge_records(local: &[SyncRecord], server: Vec<SyncRecord>) -> Vec<SyncRecord> {
    let mut merged = Vec::with_capacity(server.len() + local.len());
    for server_item in server {
        let matching_local = local.iter().find(|item| item.id == server_item.id);
        match matching_local {
            Some(local_item) if is_newer(local_item, &server_item) => {
                let mut kept = local_item.clone();
                kept.has_conflict = true;
                merged.push(kept);
            }
            _ => merged.push(server_item),
        }
    }

    for local_item in local {
        if merged.iter().any(|item| item.id == local_item.id) {
            continue;
        }
        let mut kept = local_item.clone();
        kept.local_only = true;
        merged.push(kept);
    }

    merged
}

/// Whether `local` carries a strictly newer modification stamp than
/// `server`. A missing stamp on either side never wins.
fn is_newer(local: &SyncRecord, server: &SyncRecord) -> bool {
    match (local.last_modified, server.last_modified) {
        (Some(local_stamp), Some(server_stamp)) => local_stamp > server_stamp,
        _ => false,
    }
}
