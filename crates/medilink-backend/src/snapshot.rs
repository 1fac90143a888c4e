//! Persistence of the application state snapshot.
//!
//! The event loop writes the full `AppState` to the cache directory on a
//! fixed cadence and once more on shutdown, and hydrates from it at startup
//! when the file is fresh enough. A stale or unreadable snapshot is ignored
//! rather than surfaced — starting from defaults is always acceptable.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use medilink_bridge::records::AppState;
use serde::{Deserialize, Serialize};
use tokio::{
    fs::{OpenOptions, create_dir_all, read_to_string, remove_file},
    io::AsyncWriteExt,
};

/// Errors that can occur while writing the snapshot file.
#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error("failed to write snapshot: {0}")]
    IoError(#[from] std::io::Error),
    #[error("failed to encode snapshot: {0}")]
    SerializeError(#[from] serde_json::Error),
}

#[derive(Debug, Serialize, Deserialize)]
struct StoredSnapshot {
    saved_at: DateTime<Utc>,
    state: AppState,
}

fn snapshot_path(cache_path: &Path) -> PathBuf {
    cache_path.join("state-snapshot.json")
}

/// Loads the persisted state if a snapshot exists and is younger than
/// `max_age_secs`. Returns `None` for a missing, stale, or unreadable file.
pub async fn load_snapshot(cache_path: &Path, max_age_secs: u64) -> Option<AppState> {
    let path = snapshot_path(cache_path);
    let contents = match read_to_string(&path).await {
        Ok(contents) => contents,
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => return None,
        Err(error) => {
            log::warn!("Could not read snapshot at {path:?}: {error}");
            return None;
        }
    };

    let snapshot: StoredSnapshot = match serde_json::from_str(&contents) {
        Ok(snapshot) => snapshot,
        Err(error) => {
            log::warn!("Ignoring unreadable snapshot at {path:?}: {error}");
            return None;
        }
    };

    let age = Utc::now().signed_duration_since(snapshot.saved_at);
    if age > ChronoDuration::seconds(max_age_secs as i64) {
        log::info!("Ignoring stale snapshot ({}s old)", age.num_seconds());
        return None;
    }

    let mut state = snapshot.state;
    // connectivity is transport-derived, never restored
    state.is_online = false;
    Some(state)
}

/// Writes the current state to the snapshot file, replacing any previous
/// snapshot.
pub async fn save_snapshot(cache_path: &Path, state: &AppState) -> Result<(), SnapshotError> {
    create_dir_all(cache_path).await?;

    let snapshot = StoredSnapshot {
        saved_at: Utc::now(),
        state: state.clone(),
    };
    let contents = serde_json::to_string(&snapshot)?;

    let path = snapshot_path(cache_path);
    let mut file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)
        .await?;
    file.write_all(contents.as_bytes()).await?;
    file.sync_all().await?;

    Ok(())
}

/// Deletes the snapshot file. A missing file is not an error.
pub async fn remove_snapshot(cache_path: &Path) -> Result<(), std::io::Error> {
    match remove_file(snapshot_path(cache_path)).await {
        Ok(()) => Ok(()),
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(error) => Err(error),
    }
}
