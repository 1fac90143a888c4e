//! Online-participant tracking driven by socket broadcasts.
//!
//! The transport delivers a full id list when the client joins and
//! incremental join/leave events afterwards. There is no client-side
//! heartbeat or timeout: a peer whose socket is severed without a leave
//! event stays in the set until the next full broadcast replaces it.

use std::collections::BTreeSet;

/// The set of participant ids currently considered online.
#[derive(Debug, Default)]
pub struct PresenceTracker {
    online: BTreeSet<String>,
}

impl PresenceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the whole set from a full broadcast. Returns whether the set
    /// changed.
    pub fn replace_all(&mut self, ids: impl IntoIterator<Item = String>) -> bool {
        let incoming: BTreeSet<String> = ids.into_iter().collect();
        if incoming == self.online {
            return false;
        }
        self.online = incoming;
        true
    }

    /// Marks one participant online. Returns whether the set changed.
    pub fn join(&mut self, id: impl Into<String>) -> bool {
        self.online.insert(id.into())
    }

    /// Marks one participant offline. Returns whether the set changed.
    pub fn leave(&mut self, id: &str) -> bool {
        self.online.remove(id)
    }

    pub fn is_online(&self, id: &str) -> bool {
        self.online.contains(id)
    }

    /// The online ids, sorted, for broadcasting to the UI.
    pub fn online_ids(&self) -> Vec<String> {
        self.online.iter().cloned().collect()
    }

    pub fn clear(&mut self) {
        self.online.clear();
    }
}
