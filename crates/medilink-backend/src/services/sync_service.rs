//! Bulk flush of the offline queue, plus its on-disk persistence.
//!
//! The queue is cleared only on a 2xx response to the bulk POST; any error
//! or rejection restores every change for the next online transition. The
//! server contract offers no per-item acknowledgement, so granularity is
//! all-or-nothing at the queue level.

use std::path::Path;

use medilink_store::queue::{OfflineChange, OfflineQueue};
use serde::Serialize;
use tokio::{
    fs::{OpenOptions, create_dir_all, read_to_string},
    io::AsyncWriteExt,
};

/// Errors that can occur while flushing or persisting the offline queue.
#[derive(Debug, thiserror::Error)]
pub(crate) enum SyncError {
    #[error("sync request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("sync endpoint rejected the queue: {0}")]
    Rejected(reqwest::StatusCode),
    #[error("failed to persist offline queue: {0}")]
    IoError(#[from] std::io::Error),
    #[error("failed to encode offline queue: {0}")]
    SerializeError(#[from] serde_json::Error),
}

/// What a flush attempt did.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum SyncOutcome {
    /// The queue was empty; no network call was made.
    Empty,
    /// There is no session token yet; the queue was kept as-is.
    NoSession,
    /// This many changes were accepted and the queue was cleared.
    Flushed(usize),
}

#[derive(Serialize)]
struct SyncRequest<'a> {
    changes: &'a [OfflineChange],
}

/// POSTs the full queue to the sync endpoint.
///
/// On a 2xx response the queue is cleared; on any failure every change is
/// restored, ahead of anything queued while the flush was in flight. An
/// empty queue returns immediately without touching the network.
pub(crate) async fn sync_offline_changes(
    context: &super::AppContextHandle,
    queue: &mut OfflineQueue,
) -> Result<SyncOutcome, SyncError> {
    if queue.is_empty() {
        return Ok(SyncOutcome::Empty);
    }

    let (client, base_url, sync_path, token) = {
        let state = context.state.read().await;
        (
            state.request_client.clone(),
            state.config.base_url.clone(),
            state.config.sync_path.clone(),
            state.auth_token.clone(),
        )
    };
    let Some(token) = token else {
        log::debug!("Keeping {} offline changes queued, no session yet", queue.len());
        return Ok(SyncOutcome::NoSession);
    };

    let changes = queue.take_all();
    let url = format!("{base_url}{sync_path}");
    log::info!("Syncing {} offline changes to {url}", changes.len());

    let request = client
        .post(&url)
        .bearer_auth(&token)
        .json(&SyncRequest { changes: &changes });
    match request.send().await {
        Ok(response) if response.status().is_success() => Ok(SyncOutcome::Flushed(changes.len())),
        Ok(response) => {
            let status = response.status();
            queue.restore(changes);
            Err(SyncError::Rejected(status))
        }
        Err(error) => {
            queue.restore(changes);
            Err(SyncError::Http(error))
        }
    }
}

fn queue_path(cache_path: &Path) -> std::path::PathBuf {
    cache_path.join("offline-queue.json")
}

/// Loads the persisted queue. A missing or unreadable file yields an empty
/// queue — queued changes are best-effort durable, never load-bearing.
pub(crate) async fn load_queue(cache_path: &Path) -> OfflineQueue {
    let path = queue_path(cache_path);
    let contents = match read_to_string(&path).await {
        Ok(contents) => contents,
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
            return OfflineQueue::new();
        }
        Err(error) => {
            log::warn!("Could not read offline queue at {path:?}: {error}");
            return OfflineQueue::new();
        }
    };
    match serde_json::from_str::<Vec<OfflineChange>>(&contents) {
        Ok(changes) => OfflineQueue::from_changes(changes),
        Err(error) => {
            log::warn!("Ignoring unreadable offline queue at {path:?}: {error}");
            OfflineQueue::new()
        }
    }
}

/// Writes the queue to disk, replacing the previous file.
pub(crate) async fn save_queue(cache_path: &Path, queue: &OfflineQueue) -> Result<(), SyncError> {
    create_dir_all(cache_path).await?;

    let contents = serde_json::to_string(queue.changes())?;
    let mut file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(queue_path(cache_path))
        .await?;
    file.write_all(contents.as_bytes()).await?;
    file.sync_all().await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::test_support::context_with;
    use medilink_bridge::config::SyncConfig;
    use medilink_bridge::records::Resource;
    use serde_json::json;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    /// Minimal HTTP server answering every connection with `status_line`.
    async fn serve(status_line: &'static str) -> (String, Arc<AtomicUsize>) {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        tokio::spawn(async move {
            loop {
                let Ok((mut socket, _)) = listener.accept().await else {
                    break;
                };
                counter.fetch_add(1, Ordering::SeqCst);
                let mut buffer = [0u8; 8192];
                let _ = socket.read(&mut buffer).await;
                let _ = socket.write_all(status_line.as_bytes()).await;
                let _ = socket.shutdown().await;
            }
        });
        (format!("http://{address}"), hits)
    }

    fn config_for(base_url: String) -> SyncConfig {
        SyncConfig {
            base_url,
            ..SyncConfig::default()
        }
    }

    #[tokio::test]
    async fn empty_queue_performs_no_network_call() {
        let dir = tempfile::tempdir().unwrap();
        // base_url points nowhere; reaching the network would error out
        let (context, _frontend_rx, _engine_rx) = context_with(
            config_for("http://127.0.0.1:1".to_string()),
            dir.path().to_path_buf(),
        );

        let mut queue = OfflineQueue::new();
        let outcome = sync_offline_changes(&context, &mut queue).await.unwrap();
        assert_eq!(outcome, SyncOutcome::Empty);
    }

    #[tokio::test]
    async fn accepted_queue_is_cleared() {
        let (base_url, hits) =
            serve("HTTP/1.1 200 OK\r\ncontent-length: 0\r\nconnection: close\r\n\r\n").await;
        let dir = tempfile::tempdir().unwrap();
        let (context, _frontend_rx, _engine_rx) =
            context_with(config_for(base_url), dir.path().to_path_buf());

        let mut queue = OfflineQueue::new();
        queue.push(Resource::Appointments, json!({"id": "a1"}));

        let outcome = sync_offline_changes(&context, &mut queue).await.unwrap();
        assert_eq!(outcome, SyncOutcome::Flushed(1));
        assert!(queue.is_empty());
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn rejected_queue_is_restored() {
        let (base_url, _hits) = serve(
            "HTTP/1.1 500 Internal Server Error\r\ncontent-length: 0\r\nconnection: close\r\n\r\n",
        )
        .await;
        let dir = tempfile::tempdir().unwrap();
        let (context, _frontend_rx, _engine_rx) =
            context_with(config_for(base_url), dir.path().to_path_buf());

        let mut queue = OfflineQueue::new();
        queue.push(Resource::Appointments, json!({"id": "a1"}));

        let error = sync_offline_changes(&context, &mut queue)
            .await
            .unwrap_err();
        assert!(matches!(error, SyncError::Rejected(status) if status.as_u16() == 500));
        assert_eq!(queue.len(), 1, "a failed flush keeps every change");
    }

    #[tokio::test]
    async fn unreachable_endpoint_restores_the_queue() {
        let dir = tempfile::tempdir().unwrap();
        let (context, _frontend_rx, _engine_rx) = context_with(
            config_for("http://127.0.0.1:1".to_string()),
            dir.path().to_path_buf(),
        );

        let mut queue = OfflineQueue::new();
        queue.push(Resource::Messages, json!({"id": "c1"}));

        let error = sync_offline_changes(&context, &mut queue)
            .await
            .unwrap_err();
        assert!(matches!(error, SyncError::Http(_)));
        assert_eq!(queue.len(), 1);
    }

    #[tokio::test]
    async fn queue_file_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let mut queue = OfflineQueue::new();
        queue.push(Resource::Appointments, json!({"id": "a1"}));

        save_queue(dir.path(), &queue).await.unwrap();
        let loaded = load_queue(dir.path()).await;
        assert_eq!(loaded.changes(), queue.changes());
    }

    #[tokio::test]
    async fn missing_queue_file_yields_an_empty_queue() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_queue(dir.path()).await.is_empty());
    }
}
