/// Runtime resources shared across async tasks.
///
/// This is the slow-changing half of the backend's state: configuration,
/// paths, the pooled HTTP client, and the session credentials polling tasks
/// read on every tick. The fast-changing application state (appointments,
/// messages, presence, connectivity) lives in the event loop's
/// `StateStore`, which is single-owner and never behind this lock.
///
/// Wrap it in [`SharedState`] to pass into async handlers and background
/// tasks that need concurrent reads and occasional writes.
#[derive(Debug, Clone)]
pub struct State {
    /// The loaded sync configuration.
    pub config: medilink_bridge::config::SyncConfig,
    /// Directory used for the state snapshot and the offline-queue file.
    pub cache_path: std::path::PathBuf,
    /// Shared HTTP client for making efficient, pooled requests.
    pub request_client: reqwest::Client,
    /// Bearer token for REST calls. `None` until a session starts; polling
    /// ticks without it are silent no-ops.
    pub auth_token: Option<String>,
    /// The signed-in user, mirrored into the store at session start.
    pub user: Option<medilink_bridge::records::UserRef>,
}

/// Thread-safe, async-friendly shared reference to the runtime [`State`].
pub type SharedState = std::sync::Arc<tokio::sync::RwLock<State>>;
