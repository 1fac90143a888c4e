//! Backend service handlers for bridge commands and engine events.
//!
//! This module groups the handlers the event loop delegates to. They operate
//! on the shared `AppContext`, perform side effects (network, filesystem),
//! and emit state updates or notifications back to the frontend.

pub mod config_service;
pub mod mutation_service;
pub mod notification_service;
pub mod polling_service;
pub mod presence_service;
pub mod session_service;
pub mod sync_service;

/// Represents a type that is used in all handlers as an application context.
pub(crate) type AppContextHandle = std::sync::Arc<crate::app::AppContext>;
