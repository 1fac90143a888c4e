//! Backend runtime setup and orchestration.
//!
//! This module wires together configuration, shared state, snapshot
//! hydration, and the event loop that processes frontend bridge commands
//! and realtime transport events.

use std::{sync::Arc, thread};

use medilink_bridge::socket::SocketEvent;
use medilink_bridge::{MessageFromBackend, MessageToBackend};
use medilink_store::StateStore;
use tokio::sync::{
    RwLock,
    mpsc::{self, Receiver, Sender},
};

use crate::app::{AppContext, EngineEvent, EventLoop};
use crate::services::sync_service;
use crate::snapshot;
use crate::state::State;

/// Initialize backend state and start processing bridge and socket traffic.
async fn setup_backend(
    rx: Receiver<MessageToBackend>,
    tx: Sender<MessageFromBackend>,
    mut socket_rx: Receiver<SocketEvent>,
) {
    let (config, cache_path) = crate::config::load_config()
        .await
        .expect("failed to load config");
    let snapshot_max_age = config.snapshot.max_age_secs;

    let request_client = reqwest::Client::new();
    let state = Arc::new(RwLock::new(State {
        config,
        cache_path: cache_path.clone(),
        request_client,
        auth_token: None,
        user: None,
    }));

    let (engine_tx, engine_rx) = mpsc::channel(64);
    let context = Arc::new(AppContext {
        state,
        tx,
        engine_tx,
    });

    // forward transport events into the engine channel so the event loop
    // stays the single writer of the store
    let socket_forwarder = context.engine_tx.clone();
    tokio::spawn(async move {
        while let Some(event) = socket_rx.recv().await {
            if socket_forwarder
                .send(EngineEvent::Socket(event))
                .await
                .is_err()
            {
                break;
            }
        }
    });

    let store = match snapshot::load_snapshot(&cache_path, snapshot_max_age).await {
        Some(persisted) => {
            log::info!("Hydrated state from a fresh snapshot");
            StateStore::with_state(persisted)
        }
        None => StateStore::new(),
    };
    let queue = sync_service::load_queue(&cache_path).await;

    EventLoop::new(context, store, queue).run(rx, engine_rx).await;
}

/// Spawn the backend runtime and begin processing bridge messages.
pub fn run(
    rx: Receiver<MessageToBackend>,
    tx: Sender<MessageFromBackend>,
    socket_rx: Receiver<SocketEvent>,
) {
    thread::spawn(move || {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .expect("failed to build tokio runtime");
        runtime.block_on(async { setup_backend(rx, tx, socket_rx).await });
    });
}
