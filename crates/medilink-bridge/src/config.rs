use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::records::Resource;

/// Polling cadence per resource class, in seconds.
///
/// Cadence is configuration, not contract: the defaults keep appointments
/// and the notification feed reasonably fresh while the message list polls
/// faster, since an open chat view is the most latency-sensitive surface
/// without a dedicated socket channel.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PollingConfig {
    /// Seconds between appointment refreshes.
    pub appointments_interval_secs: u64,
    /// Seconds between conversation refreshes.
    pub messages_interval_secs: u64,
    /// Seconds between notification-feed refreshes.
    pub notifications_interval_secs: u64,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            appointments_interval_secs: 10,
            messages_interval_secs: 3,
            notifications_interval_secs: 10,
        }
    }
}

/// Cadence and freshness window for the persisted state snapshot.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SnapshotConfig {
    /// Seconds between periodic snapshot writes.
    pub interval_secs: u64,
    /// A snapshot older than this many seconds is ignored at startup.
    pub max_age_secs: u64,
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            interval_secs: 30,
            max_age_secs: 300,
        }
    }
}

/// Global sync configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SyncConfig {
    /// Base URL of the clinic REST API, without a trailing slash.
    pub base_url: String,
    /// Path of the bulk offline-change sync endpoint, relative to `base_url`.
    pub sync_path: String,
    /// Polling cadence per resource class.
    pub polling: PollingConfig,
    /// Snapshot persistence settings.
    pub snapshot: SnapshotConfig,
}

impl SyncConfig {
    /// Configured polling interval for the given resource.
    pub fn interval_for(&self, resource: Resource) -> Duration {
        let secs = match resource {
            Resource::Appointments => self.polling.appointments_interval_secs,
            Resource::Messages => self.polling.messages_interval_secs,
            Resource::Notifications => self.polling.notifications_interval_secs,
        };
        Duration::from_secs(secs)
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5000/api".to_string(),
            sync_path: "/sync/offline-changes".to_string(),
            polling: PollingConfig::default(),
            snapshot: SnapshotConfig::default(),
        }
    }
}
