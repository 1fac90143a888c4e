//! Application context and the event loop that owns the state store.
//!
//! The context carries the shared runtime resources and the outbound bridge
//! sender. The event loop is the single writer of the `StateStore`: bridge
//! commands, polling results, and socket events all funnel into it and are
//! applied one at a time, so state mutation and subscriber notification are
//! atomic with respect to each other.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use medilink_bridge::notification::NotificationMessage;
use medilink_bridge::records::{Resource, SyncRecord};
use medilink_bridge::socket::SocketEvent;
use medilink_bridge::{MessageFromBackend, MessageToBackend};
use medilink_store::presence::PresenceTracker;
use medilink_store::queue::OfflineQueue;
use medilink_store::transitions::appointment_transitions;
use medilink_store::{StateKey, StateStore, StateUpdate, SubscriberError, Subscription, UpdateSource};
use serde_json::json;
use tokio::sync::mpsc::{Receiver, Sender};

use crate::services::{
    self, AppContextHandle, notification_service, polling_service::PollingRegistry, sync_service,
    sync_service::SyncOutcome,
};
use crate::snapshot;
use crate::state::SharedState;

/// Shared application context passed to services and background tasks.
pub(crate) struct AppContext {
    /// Shared runtime resources (config, HTTP client, credentials).
    pub state: SharedState,
    /// Outbound channel to the frontend bridge.
    pub tx: Sender<MessageFromBackend>,
    /// Inbound channel for results produced off the event loop (polling
    /// fetches, socket traffic).
    pub engine_tx: Sender<EngineEvent>,
}

impl AppContext {
    /// Send a message to the frontend bridge.
    pub async fn send(&self, message: MessageFromBackend) {
        if self.tx.send(message).await.is_err() {
            log::warn!("Dropping a backend push, the bridge receiver is gone");
        }
    }

    /// Send a toast notification to the frontend bridge.
    pub async fn send_notification(&self, notification: NotificationMessage) {
        self.send(MessageFromBackend::NotificationMessage(notification))
            .await;
    }
}

/// Work produced outside the event loop, applied by it in arrival order.
#[derive(Debug)]
pub(crate) enum EngineEvent {
    /// A polling fetch finished with a fresh record list.
    PollCompleted {
        resource: Resource,
        records: Vec<SyncRecord>,
    },
    /// The realtime transport delivered an event.
    Socket(SocketEvent),
}

/// The dispatch loop owning the store, presence tracker, offline queue, and
/// polling registry.
pub(crate) struct EventLoop {
    context: AppContextHandle,
    store: StateStore,
    presence: PresenceTracker,
    queue: OfflineQueue,
    pollers: PollingRegistry,
    /// Slots touched since the last outbound flush, recorded by the
    /// wildcard subscriber below.
    changed_keys: Arc<Mutex<Vec<StateKey>>>,
    /// Toasts produced by the appointment-transition subscriber.
    pending_toasts: Arc<Mutex<Vec<NotificationMessage>>>,
    _subscriptions: Vec<Subscription>,
}

impl EventLoop {
    pub fn new(context: AppContextHandle, mut store: StateStore, queue: OfflineQueue) -> Self {
        let changed_keys: Arc<Mutex<Vec<StateKey>>> = Arc::default();
        let key_sink = changed_keys.clone();
        let outbound = store.subscribe_all(Box::new(move |_, key| {
            key_sink
                .lock()
                .map_err(|_| SubscriberError("changed-key sink is poisoned".into()))?
                .push(key);
            Ok(())
        }));

        let pending_toasts: Arc<Mutex<Vec<NotificationMessage>>> = Arc::default();
        let toast_sink = pending_toasts.clone();
        let transitions = store.subscribe(
            StateKey::Appointments,
            Box::new(move |new_value, old_value| {
                let mut sink = toast_sink
                    .lock()
                    .map_err(|_| SubscriberError("toast sink is poisoned".into()))?;
                for (_, transition) in
                    appointment_transitions(old_value.records(), new_value.records())
                {
                    sink.push(notification_service::appointment_toast(transition));
                }
                Ok(())
            }),
        );

        Self {
            context,
            store,
            presence: PresenceTracker::new(),
            queue,
            pollers: PollingRegistry::default(),
            changed_keys,
            pending_toasts,
            _subscriptions: vec![outbound, transitions],
        }
    }

    /// Read and dispatch bridge commands and engine events until the bridge
    /// closes, snapshotting on a fixed cadence along the way.
    pub async fn run(
        mut self,
        mut rx: Receiver<MessageToBackend>,
        mut engine_rx: Receiver<EngineEvent>,
    ) {
        let snapshot_secs = {
            let state = self.context.state.read().await;
            state.config.snapshot.interval_secs.max(1)
        };
        let mut snapshot_ticker = tokio::time::interval(Duration::from_secs(snapshot_secs));
        snapshot_ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                message = rx.recv() => match message {
                    Some(message) => {
                        log::debug!("Got a frontend message: {message:?}");
                        self.dispatch_message(message).await;
                    }
                    None => break,
                },
                Some(event) = engine_rx.recv() => self.dispatch_engine_event(event).await,
                _ = snapshot_ticker.tick() => self.write_snapshot().await,
            }
        }

        self.shutdown().await;
    }

    /// Dispatches a received frontend command down to the service handlers.
    async fn dispatch_message(&mut self, message: MessageToBackend) {
        match message {
            MessageToBackend::ConfigurationRequest => {
                services::config_service::handle_config_request(self.context.clone()).await;
            }
            MessageToBackend::StateRequest => {
                self.context
                    .send(MessageFromBackend::CurrentStateResponse(
                        self.store.state().clone(),
                    ))
                    .await;
            }
            MessageToBackend::SessionStarted { auth_token, user } => {
                services::session_service::handle_session_started(
                    &self.context,
                    &mut self.store,
                    &mut self.pollers,
                    auth_token,
                    user,
                )
                .await;
            }
            MessageToBackend::LogoutRequest => {
                services::session_service::handle_logout(
                    &self.context,
                    &mut self.store,
                    &mut self.pollers,
                    &mut self.queue,
                )
                .await;
            }
            MessageToBackend::StartUpdatesRequest {
                resource,
                interval_secs,
            } => {
                let interval = match interval_secs {
                    Some(secs) => Duration::from_secs(secs.max(1)),
                    None => {
                        let state = self.context.state.read().await;
                        state.config.interval_for(resource)
                    }
                };
                services::polling_service::start_updates(
                    self.context.clone(),
                    &mut self.pollers,
                    resource,
                    interval,
                );
            }
            MessageToBackend::StopUpdatesRequest(resource) => self.pollers.stop(resource),
            MessageToBackend::StopAllUpdatesRequest => self.pollers.stop_all(),
            MessageToBackend::MutationRequest(mutation) => {
                services::mutation_service::handle_mutation(
                    &self.context,
                    &mut self.store,
                    &mut self.queue,
                    mutation,
                )
                .await;
            }
        }
        self.flush_outbound().await;
    }

    /// Applies one engine event to the store.
    async fn dispatch_engine_event(&mut self, event: EngineEvent) {
        match event {
            EngineEvent::PollCompleted { resource, records } => {
                self.store.smart_update(
                    StateUpdate::resource_records(resource, records),
                    UpdateSource::Server,
                );
            }
            EngineEvent::Socket(event) => self.dispatch_socket_event(event).await,
        }
        self.flush_outbound().await;
    }

    async fn dispatch_socket_event(&mut self, event: SocketEvent) {
        match event {
            SocketEvent::Connected => self.set_connectivity(true).await,
            SocketEvent::Disconnected => self.set_connectivity(false).await,
            SocketEvent::DirectMessage {
                conversation_id,
                sender_id,
                message,
                timestamp,
            } => self.apply_direct_message(conversation_id, sender_id, message, timestamp),
            presence_event => {
                if services::presence_service::apply_presence_event(
                    &mut self.presence,
                    &presence_event,
                ) {
                    self.context
                        .send(MessageFromBackend::PresenceUpdate(
                            self.presence.online_ids(),
                        ))
                        .await;
                }
            }
        }
    }

    /// Applies a connectivity flip: transitions only, a repeated report of
    /// the current state does nothing. Coming back online flushes the
    /// offline queue, once per transition.
    async fn set_connectivity(&mut self, online: bool) {
        if self.store.state().is_online == online {
            return;
        }
        self.store.update(StateUpdate::Connectivity(online));
        self.context
            .send_notification(notification_service::connectivity_toast(online))
            .await;

        if online {
            match sync_service::sync_offline_changes(&self.context, &mut self.queue).await {
                Ok(SyncOutcome::Flushed(count)) => {
                    log::info!("Flushed {count} offline changes after reconnect");
                    self.persist_queue().await;
                }
                Ok(_) => {}
                Err(error) => {
                    log::warn!("Offline sync failed, keeping the queue: {error}");
                }
            }
        }
    }

    /// Upserts the conversation a chat message belongs to, so the open chat
    /// view updates without waiting for the next poll.
    fn apply_direct_message(
        &mut self,
        conversation_id: String,
        sender_id: String,
        message: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    ) {
        let mut conversations = self.store.state().messages.clone();
        match conversations
            .iter_mut()
            .find(|conversation| conversation.id == conversation_id)
        {
            Some(conversation) => {
                conversation
                    .fields
                    .insert("lastMessage".into(), json!(message));
                conversation
                    .fields
                    .insert("lastSenderId".into(), json!(sender_id));
                conversation.last_modified = Some(timestamp);
            }
            None => {
                let mut conversation = SyncRecord::new(conversation_id);
                conversation.last_modified = Some(timestamp);
                conversation
                    .fields
                    .insert("lastMessage".into(), json!(message));
                conversation
                    .fields
                    .insert("lastSenderId".into(), json!(sender_id));
                conversations.push(conversation);
            }
        }
        self.store.update(StateUpdate::Messages(conversations));
    }

    /// Pushes one update per slot touched since the last flush, then any
    /// toasts the transition subscriber produced.
    async fn flush_outbound(&mut self) {
        let changed: Vec<StateKey> = {
            let mut guard = match self.changed_keys.lock() {
                Ok(guard) => guard,
                Err(_) => return,
            };
            let mut deduped = Vec::new();
            for key in guard.drain(..) {
                if !deduped.contains(&key) {
                    deduped.push(key);
                }
            }
            deduped
        };

        for key in changed {
            let state = self.store.state();
            let message = match key {
                StateKey::Appointments => {
                    MessageFromBackend::AppointmentsUpdate(state.appointments.clone())
                }
                StateKey::Messages => MessageFromBackend::MessagesUpdate(state.messages.clone()),
                StateKey::Notifications => {
                    MessageFromBackend::NotificationsUpdate(state.notifications.clone())
                }
                StateKey::User => MessageFromBackend::UserUpdate(state.user.clone()),
                StateKey::Connectivity => MessageFromBackend::ConnectivityUpdate(state.is_online),
            };
            self.context.send(message).await;
        }

        let toasts: Vec<NotificationMessage> = match self.pending_toasts.lock() {
            Ok(mut guard) => guard.drain(..).collect(),
            Err(_) => return,
        };
        for toast in toasts {
            self.context.send_notification(toast).await;
        }
    }

    /// Periodic snapshot write; skipped before a session starts since there
    /// is nothing worth persisting.
    async fn write_snapshot(&self) {
        if self.store.state().user.is_none() {
            return;
        }
        let cache_path = {
            let state = self.context.state.read().await;
            state.cache_path.clone()
        };
        if let Err(error) = snapshot::save_snapshot(&cache_path, self.store.state()).await {
            log::warn!("Snapshot write failed: {error}");
        }
    }

    async fn persist_queue(&self) {
        let cache_path = {
            let state = self.context.state.read().await;
            state.cache_path.clone()
        };
        if let Err(error) = sync_service::save_queue(&cache_path, &self.queue).await {
            log::warn!("Could not persist the offline queue: {error}");
        }
    }

    /// Best-effort teardown when the bridge closes.
    async fn shutdown(mut self) {
        self.pollers.stop_all();
        self.write_snapshot().await;
        self.persist_queue().await;
        log::info!("Bridge closed, backend event loop exiting");
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::state::State;
    use medilink_bridge::config::SyncConfig;
    use std::path::PathBuf;
    use tokio::sync::{RwLock, mpsc};

    /// Builds a context around the given config with a test token already
    /// installed. The returned receivers keep the channels open.
    pub(crate) fn context_with(
        config: SyncConfig,
        cache_path: PathBuf,
    ) -> (
        AppContextHandle,
        mpsc::Receiver<MessageFromBackend>,
        mpsc::Receiver<EngineEvent>,
    ) {
        let (tx, frontend_rx) = mpsc::channel(64);
        let (engine_tx, engine_rx) = mpsc::channel(64);
        let state = Arc::new(RwLock::new(State {
            config,
            cache_path,
            request_client: reqwest::Client::new(),
            auth_token: Some("test-token".into()),
            user: None,
        }));
        (
            Arc::new(AppContext {
                state,
                tx,
                engine_tx,
            }),
            frontend_rx,
            engine_rx,
        )
    }
}
