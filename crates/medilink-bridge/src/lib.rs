//! Communication bridge between the UI shell and the sync backend.
//!
//! This crate defines the types and protocols used to connect a user
//! interface with the asynchronous backend responsible for keeping local
//! appointment, messaging, and notification state reconciled against the
//! clinic's REST API and realtime transport.
//!
//! The design is deliberately lightweight and unidirectional:
//! - The frontend sends commands (e.g., start a session, submit a change,
//!   start or stop polling a resource).
//! - The backend pushes events (e.g., refreshed record lists, presence
//!   changes, connectivity changes, toast notifications).
//!
//! Communication happens over bounded [`tokio::sync::mpsc`] channels wrapped
//! in [`BridgeChannels`], providing back-pressure, async compatibility, and
//! clean separation of concerns. The realtime transport feeds the backend
//! through a separate channel of [`socket::SocketEvent`]s; the transport
//! itself lives outside this workspace.

pub mod config;
pub mod notification;
pub mod records;
pub mod socket;

use tokio::sync::mpsc::{self, Receiver, Sender};

use crate::records::{AppState, Mutation, Resource, SyncRecord, UserRef};

/// Messages emitted by the backend to inform the frontend of state updates.
///
/// These are typically sent in response to frontend requests or pushed
/// asynchronously when polling or socket traffic lands new state. Per-key
/// update variants are the single broadcast channel for state changes; any
/// component that needs to react to a refresh listens here.
#[derive(Debug, Clone)]
pub enum MessageFromBackend {
    /// Generic message for all toast notifications in the application.
    NotificationMessage(notification::NotificationMessage),
    /// Response to the configuration request from the frontend.
    ConfigurationResponse(config::SyncConfig),
    /// Response to a full-state request, for late-mounting components.
    CurrentStateResponse(AppState),
    /// The appointments list changed.
    AppointmentsUpdate(Vec<SyncRecord>),
    /// The conversation list changed.
    MessagesUpdate(Vec<SyncRecord>),
    /// The notification feed changed.
    NotificationsUpdate(Vec<SyncRecord>),
    /// The signed-in user reference changed.
    UserUpdate(Option<UserRef>),
    /// Connectivity to the realtime transport changed.
    ConnectivityUpdate(bool),
    /// The set of online participant ids changed.
    PresenceUpdate(Vec<String>),
}

/// Commands issued by the frontend to control or query the backend.
///
/// These messages drive the core functionality of the sync layer.
#[derive(Debug, Clone)]
pub enum MessageToBackend {
    /// Request for the sync configuration.
    ConfigurationRequest,
    /// Request for the full current state.
    StateRequest,
    /// A session began: install the bearer token and begin polling.
    SessionStarted {
        /// Bearer token used to authenticate REST calls.
        auth_token: String,
        /// Reference to the signed-in user.
        user: UserRef,
    },
    /// End the session: stop polling and reset local state.
    LogoutRequest,
    /// Begin periodic refreshes for one resource class.
    StartUpdatesRequest {
        resource: Resource,
        /// Overrides the configured cadence when set.
        interval_secs: Option<u64>,
    },
    /// Stop periodic refreshes for one resource class.
    StopUpdatesRequest(Resource),
    /// Stop every running refresh.
    StopAllUpdatesRequest,
    /// Submit a locally-made change for optimistic apply and upload.
    MutationRequest(Mutation),
}

/// Paired `tokio::mpsc` channels for bidirectional communication between
/// frontend and backend.
pub struct BridgeChannels {
    /// Receiver used by the frontend to get messages from the backend.
    pub frontend_rx: Receiver<MessageFromBackend>,
    /// Sender used by the frontend to send commands to the backend.
    pub frontend_tx: Sender<MessageToBackend>,

    /// Receiver used by the backend to get commands from the frontend.
    pub backend_rx: Receiver<MessageToBackend>,
    /// Sender used by the backend to send events/responses to the frontend.
    pub backend_tx: Sender<MessageFromBackend>,
}

impl BridgeChannels {
    /// Creates a new pair of bridged channels with the given buffer capacity.
    pub fn new(buffer: usize) -> Self {
        let (to_backend_tx, to_backend_rx) = mpsc::channel(buffer);
        let (to_frontend_tx, to_frontend_rx) = mpsc::channel(buffer);
        Self {
            frontend_tx: to_backend_tx,
            frontend_rx: to_frontend_rx,
            backend_rx: to_backend_rx,
            backend_tx: to_frontend_tx,
        }
    }
}

impl Default for BridgeChannels {
    fn default() -> Self {
        Self::new(64)
    }
}
