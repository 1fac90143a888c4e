//! Backend runtime entry point and public API surface.
//!
//! This crate owns the sync lifecycle: it routes bridge commands and socket
//! events into the event loop that holds the state store, runs the polling
//! engine, persists snapshots and the offline queue, and pushes state
//! updates and toast notifications back over the bridge.

mod app;
mod config;
mod runtime;
mod services;
mod snapshot;
mod state;

pub use crate::runtime::run;
