//! Session lifecycle: installing credentials and starting the pollers, and
//! tearing everything down again at logout.

use medilink_bridge::records::{Resource, UserRef};
use medilink_store::queue::OfflineQueue;
use medilink_store::{StateStore, StateUpdate};

use super::{polling_service, polling_service::PollingRegistry, sync_service};
use crate::snapshot;

/// Handles a session start (see
/// [`medilink_bridge::MessageToBackend::SessionStarted`]): installs the
/// bearer token and user, then begins polling every resource at its
/// configured cadence.
pub(crate) async fn handle_session_started(
    context: &super::AppContextHandle,
    store: &mut StateStore,
    pollers: &mut PollingRegistry,
    auth_token: String,
    user: UserRef,
) {
    let config = {
        let mut state = context.state.write().await;
        state.auth_token = Some(auth_token);
        state.user = Some(user.clone());
        state.config.clone()
    };

    log::info!("Session started for user {}", user.id);
    store.update(StateUpdate::User(Some(user)));

    for resource in Resource::ALL {
        polling_service::start_updates(
            context.clone(),
            pollers,
            resource,
            config.interval_for(resource),
        );
    }
}

/// Handles a logout (see
/// [`medilink_bridge::MessageToBackend::LogoutRequest`]): stops every
/// poller, drops the credentials, resets local state, and removes the
/// persisted snapshot and queue so nothing leaks into the next session.
pub(crate) async fn handle_logout(
    context: &super::AppContextHandle,
    store: &mut StateStore,
    pollers: &mut PollingRegistry,
    queue: &mut OfflineQueue,
) {
    pollers.stop_all();

    let cache_path = {
        let mut state = context.state.write().await;
        state.auth_token = None;
        state.user = None;
        state.cache_path.clone()
    };

    store.reset();
    queue.clear();
    if let Err(error) = sync_service::save_queue(&cache_path, queue).await {
        log::warn!("Could not clear the persisted offline queue: {error}");
    }
    if let Err(error) = snapshot::remove_snapshot(&cache_path).await {
        log::warn!("Could not remove the state snapshot: {error}");
    }

    log::info!("Session ended, local state reset");
}
