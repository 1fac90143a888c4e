use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::{self, Receiver, Sender};

/// Events delivered by the realtime transport.
///
/// The socket client itself lives outside this workspace; whatever owns it
/// decodes the wire traffic into these events and feeds them to the backend
/// through the channel from [`socket_channel`]. Presence is derived entirely
/// from the broadcast events below — there is no client-side heartbeat, so a
/// peer whose socket is severed without a `UserLeft` event stays online until
/// the next full [`SocketEvent::UsersOnline`] broadcast.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "payload", rename_all = "kebab-case")]
pub enum SocketEvent {
    /// The transport established (or re-established) its connection.
    Connected,
    /// The transport lost its connection.
    Disconnected,
    /// A chat message addressed to one of the user's conversations.
    #[serde(rename_all = "camelCase")]
    DirectMessage {
        conversation_id: String,
        sender_id: String,
        message: String,
        timestamp: DateTime<Utc>,
    },
    /// Full replacement of the online-participant set.
    UsersOnline(Vec<String>),
    /// A single participant came online.
    UserJoined(String),
    /// A single participant went offline cleanly.
    UserLeft(String),
}

/// Creates the bounded channel carrying transport events into the backend.
pub fn socket_channel(buffer: usize) -> (Sender<SocketEvent>, Receiver<SocketEvent>) {
    mpsc::channel(buffer)
}
