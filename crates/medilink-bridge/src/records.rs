use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Resource classes the backend keeps refreshed by polling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Resource {
    Appointments,
    Messages,
    Notifications,
}

impl Resource {
    /// Every pollable resource, in the order sessions start them.
    pub const ALL: [Resource; 3] = [
        Resource::Appointments,
        Resource::Messages,
        Resource::Notifications,
    ];

    /// REST path for this resource, relative to the configured base URL.
    pub fn path(&self) -> &'static str {
        match self {
            Resource::Appointments => "/appointments",
            Resource::Messages => "/messages",
            Resource::Notifications => "/notifications",
        }
    }
}

impl std::fmt::Display for Resource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Resource::Appointments => write!(f, "appointments"),
            Resource::Messages => write!(f, "messages"),
            Resource::Notifications => write!(f, "notifications"),
        }
    }
}

fn is_false(value: &bool) -> bool {
    !*value
}

/// An opaque server-identified record (appointment, conversation, or
/// notification-feed entry).
///
/// The server assigns the id and owns the record's shape; the client carries
/// everything it does not interpret in [`SyncRecord::fields`]. The two flags
/// are purely client-side reconciliation markers: `local_only` marks an
/// optimistic record the server has not confirmed yet, and `has_conflict`
/// marks a slot where a newer local edit shadowed the server's copy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncRecord {
    pub id: String,
    /// Last modification stamp, when the server (or an optimistic local
    /// write) provides one. Records without it never win a merge.
    #[serde(
        default,
        rename = "lastModified",
        skip_serializing_if = "Option::is_none"
    )]
    pub last_modified: Option<DateTime<Utc>>,
    #[serde(default, rename = "isLocalOnly", skip_serializing_if = "is_false")]
    pub local_only: bool,
    #[serde(default, rename = "hasConflict", skip_serializing_if = "is_false")]
    pub has_conflict: bool,
    /// Every field the client does not interpret, passed through verbatim.
    #[serde(flatten)]
    pub fields: serde_json::Map<String, serde_json::Value>,
}

impl SyncRecord {
    /// Creates a bare record with the given id and no fields.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            last_modified: None,
            local_only: false,
            has_conflict: false,
            fields: serde_json::Map::new(),
        }
    }

    /// Returns a string-valued passthrough field, if present.
    pub fn field_str(&self, name: &str) -> Option<&str> {
        self.fields.get(name).and_then(|value| value.as_str())
    }
}

/// Reference to the signed-in user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRef {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

/// The full client-side state kept reconciled by the backend.
///
/// A single instance lives inside the backend event loop; it is mutated only
/// through the store's update entry points and reset at logout. It is also
/// the payload of [`crate::MessageFromBackend::CurrentStateResponse`] and of
/// the persisted snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppState {
    pub appointments: Vec<SyncRecord>,
    pub messages: Vec<SyncRecord>,
    pub notifications: Vec<SyncRecord>,
    pub user: Option<UserRef>,
    pub is_online: bool,
    /// Stamped on every store update.
    pub last_update: DateTime<Utc>,
}

impl Default for AppState {
    fn default() -> Self {
        Self {
            appointments: Vec::new(),
            messages: Vec::new(),
            notifications: Vec::new(),
            user: None,
            // offline until the transport reports otherwise
            is_online: false,
            last_update: Utc::now(),
        }
    }
}

/// A locally-made change submitted over the bridge.
///
/// The payload is opaque to the sync layer; it is uploaded verbatim to the
/// resource endpoint (or queued verbatim while offline). A payload carrying
/// an `id` field updates that record optimistically; one without gets a
/// temporary local id until the server assigns a real one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mutation {
    pub resource: Resource,
    pub payload: serde_json::Value,
}

/// The `{ "data": [...] }` envelope every REST list endpoint returns.
#[derive(Debug, Deserialize)]
pub struct DataEnvelope<T> {
    pub data: Vec<T>,
}
