//! Client-side state reconciliation primitives.
//!
//! This crate provides the pieces the sync backend composes into its event
//! loop: a publish/subscribe [`StateStore`] holding the application state, a
//! per-item last-writer-wins merge for server refreshes, an offline mutation
//! queue, a presence tracker, and appointment status-transition detection.
//!
//! # Single-writer model
//! The store is deliberately not wrapped in a lock: exactly one task owns it
//! and applies every mutation, so state changes and subscriber notification
//! are atomic with respect to each other. Anything else that wants to mutate
//! state sends the owner an event instead.

pub mod merge;
pub mod presence;
pub mod queue;
pub mod transitions;

use std::collections::HashMap;
use std::mem;

use chrono::Utc;
use medilink_bridge::records::{AppState, Resource, SyncRecord, UserRef};

/// Addressable slots of [`AppState`], used to subscribe and to report which
/// slot an update touched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StateKey {
    Appointments,
    Messages,
    Notifications,
    User,
    Connectivity,
}

impl StateKey {
    /// Every slot, in reset order.
    pub const ALL: [StateKey; 5] = [
        StateKey::Appointments,
        StateKey::Messages,
        StateKey::Notifications,
        StateKey::User,
        StateKey::Connectivity,
    ];

    /// The slot holding the given polled resource.
    pub fn of_resource(resource: Resource) -> StateKey {
        match resource {
            Resource::Appointments => StateKey::Appointments,
            Resource::Messages => StateKey::Messages,
            Resource::Notifications => StateKey::Notifications,
        }
    }
}

/// An owned replacement value for one state slot.
///
/// The variant determines the slot, so an update can never be applied to a
/// slot of the wrong shape.
#[derive(Debug, Clone, PartialEq)]
pub enum StateUpdate {
    Appointments(Vec<SyncRecord>),
    Messages(Vec<SyncRecord>),
    Notifications(Vec<SyncRecord>),
    User(Option<UserRef>),
    Connectivity(bool),
}

impl StateUpdate {
    /// The slot this update replaces.
    pub fn key(&self) -> StateKey {
        match self {
            StateUpdate::Appointments(_) => StateKey::Appointments,
            StateUpdate::Messages(_) => StateKey::Messages,
            StateUpdate::Notifications(_) => StateKey::Notifications,
            StateUpdate::User(_) => StateKey::User,
            StateUpdate::Connectivity(_) => StateKey::Connectivity,
        }
    }

    /// The default (logged-out) value for a slot.
    pub fn default_for(key: StateKey) -> StateUpdate {
        match key {
            StateKey::Appointments => StateUpdate::Appointments(Vec::new()),
            StateKey::Messages => StateUpdate::Messages(Vec::new()),
            StateKey::Notifications => StateUpdate::Notifications(Vec::new()),
            StateKey::User => StateUpdate::User(None),
            StateKey::Connectivity => StateUpdate::Connectivity(false),
        }
    }

    /// Borrowed view of this update's value.
    pub fn as_slot(&self) -> StateSlot<'_> {
        match self {
            StateUpdate::Appointments(records)
            | StateUpdate::Messages(records)
            | StateUpdate::Notifications(records) => StateSlot::Records(records),
            StateUpdate::User(user) => StateSlot::User(user.as_ref()),
            StateUpdate::Connectivity(online) => StateSlot::Connectivity(*online),
        }
    }

    /// The update replacing the slot of a polled resource.
    pub fn resource_records(resource: Resource, records: Vec<SyncRecord>) -> StateUpdate {
        StateUpdate::with_records(StateKey::of_resource(resource), records)
    }

    fn with_records(key: StateKey, records: Vec<SyncRecord>) -> StateUpdate {
        match key {
            StateKey::Appointments => StateUpdate::Appointments(records),
            StateKey::Messages => StateUpdate::Messages(records),
            StateKey::Notifications => StateUpdate::Notifications(records),
            StateKey::User | StateKey::Connectivity => {
                unreachable!("{key:?} does not hold records")
            }
        }
    }
}

/// Borrowed view of one state slot, handed to subscribers as the new and
/// previous value.
#[derive(Debug, Clone, Copy)]
pub enum StateSlot<'a> {
    Records(&'a [SyncRecord]),
    User(Option<&'a UserRef>),
    Connectivity(bool),
}

impl<'a> StateSlot<'a> {
    /// Borrowed view of the given slot of `state`.
    pub fn of(state: &'a AppState, key: StateKey) -> StateSlot<'a> {
        match key {
            StateKey::Appointments => StateSlot::Records(&state.appointments),
            StateKey::Messages => StateSlot::Records(&state.messages),
            StateKey::Notifications => StateSlot::Records(&state.notifications),
            StateKey::User => StateSlot::User(state.user.as_ref()),
            StateKey::Connectivity => StateSlot::Connectivity(state.is_online),
        }
    }

    /// The records behind a list-valued slot, or an empty slice otherwise.
    pub fn records(self) -> &'a [SyncRecord] {
        match self {
            StateSlot::Records(records) => records,
            _ => &[],
        }
    }
}

/// Where a state update originated, which decides how it lands.
///
/// Local writes and first loads overwrite their slot directly; a server
/// refresh of a list that already has local content reconciles per item so
/// optimistic records survive until the server confirms them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateSource {
    Server,
    Local,
}

/// Error returned by a subscriber callback.
///
/// A failing subscriber is logged and skipped; it neither interrupts
/// delivery to the remaining subscribers nor rolls back the state change.
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct SubscriberError(pub String);

/// Callback for a single-slot subscription, invoked with the new and the
/// previous value of that slot.
pub type KeyCallback =
    Box<dyn FnMut(StateSlot<'_>, StateSlot<'_>) -> Result<(), SubscriberError> + Send>;

/// Callback for a wildcard subscription, invoked with the full state and the
/// key that changed.
pub type WildcardCallback =
    Box<dyn FnMut(&AppState, StateKey) -> Result<(), SubscriberError> + Send>;

/// Handle for a registration made with [`StateStore::subscribe`] or
/// [`StateStore::subscribe_all`]. Pass it back to
/// [`StateStore::unsubscribe`] when the subscribing component goes away; the
/// callback never fires afterwards.
#[must_use = "dropping the handle leaks the registration; call unsubscribe"]
#[derive(Debug)]
pub struct Subscription {
    id: u64,
    key: Option<StateKey>,
}

struct KeySubscriber {
    id: u64,
    callback: KeyCallback,
}

struct WildcardSubscriber {
    id: u64,
    callback: WildcardCallback,
}

/// The application state plus its publish/subscribe surface.
///
/// Every mutation goes through [`StateStore::update`] (or
/// [`StateStore::smart_update`] for source-aware writes), which replaces the
/// slot, stamps `last_update`, and synchronously notifies the slot's
/// subscribers followed by the wildcard subscribers.
pub struct StateStore {
    state: AppState,
    next_subscription: u64,
    key_subscribers: HashMap<StateKey, Vec<KeySubscriber>>,
    wildcard_subscribers: Vec<WildcardSubscriber>,
}

impl Default for StateStore {
    fn default() -> Self {
        Self::new()
    }
}

impl StateStore {
    /// Creates a store holding the default (logged-out) state.
    pub fn new() -> Self {
        Self::with_state(AppState::default())
    }

    /// Creates a store holding a previously persisted state, e.g. a hydrated
    /// snapshot.
    pub fn with_state(state: AppState) -> Self {
        Self {
            state,
            next_subscription: 0,
            key_subscribers: HashMap::new(),
            wildcard_subscribers: Vec::new(),
        }
    }

    /// The live state. No copy is made; the reference is only valid until
    /// the next mutation.
    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Borrowed view of one slot of the live state.
    pub fn get(&self, key: StateKey) -> StateSlot<'_> {
        StateSlot::of(&self.state, key)
    }

    /// Registers a callback for changes to one slot. Delivery order follows
    /// registration order.
    pub fn subscribe(&mut self, key: StateKey, callback: KeyCallback) -> Subscription {
        let id = self.next_id();
        self.key_subscribers
            .entry(key)
            .or_default()
            .push(KeySubscriber { id, callback });
        Subscription { id, key: Some(key) }
    }

    /// Registers a callback for changes to any slot.
    pub fn subscribe_all(&mut self, callback: WildcardCallback) -> Subscription {
        let id = self.next_id();
        self.wildcard_subscribers
            .push(WildcardSubscriber { id, callback });
        Subscription { id, key: None }
    }

    /// Removes a registration. The callback will not be invoked again.
    pub fn unsubscribe(&mut self, subscription: Subscription) {
        match subscription.key {
            Some(key) => {
                if let Some(subscribers) = self.key_subscribers.get_mut(&key) {
                    subscribers.retain(|entry| entry.id != subscription.id);
                }
            }
            None => self
                .wildcard_subscribers
                .retain(|entry| entry.id != subscription.id),
        }
    }

    /// Replaces one slot, stamps `last_update`, and synchronously notifies
    /// the slot's subscribers (new and previous value) and every wildcard
    /// subscriber (full state and changed key).
    ///
    /// A failing subscriber is logged and skipped — the state change is not
    /// rolled back, and later subscribers still run.
    pub fn update(&mut self, update: StateUpdate) {
        let key = update.key();
        let previous = self.swap(update);
        self.state.last_update = Utc::now();

        let state = &self.state;
        let new_value = StateSlot::of(state, key);
        let old_value = previous.as_slot();
        if let Some(subscribers) = self.key_subscribers.get_mut(&key) {
            for entry in subscribers.iter_mut() {
                if let Err(error) = (entry.callback)(new_value, old_value) {
                    log::warn!("subscriber {} for {key:?} failed: {error}", entry.id);
                }
            }
        }
        for entry in self.wildcard_subscribers.iter_mut() {
            if let Err(error) = (entry.callback)(state, key) {
                log::warn!("wildcard subscriber {} failed: {error}", entry.id);
            }
        }
    }

    /// Source-aware update.
    ///
    /// Local writes overwrite their slot. A server refresh of a list slot
    /// that already has content merges per item (see
    /// [`merge::merge_records`]); with no current content it overwrites
    /// directly. Non-list slots always overwrite.
    pub fn smart_update(&mut self, update: StateUpdate, source: UpdateSource) {
        match source {
            UpdateSource::Local => self.update(update),
            UpdateSource::Server => match update {
                StateUpdate::Appointments(incoming) => {
                    self.merge_into(StateKey::Appointments, incoming)
                }
                StateUpdate::Messages(incoming) => self.merge_into(StateKey::Messages, incoming),
                StateUpdate::Notifications(incoming) => {
                    self.merge_into(StateKey::Notifications, incoming)
                }
                other => self.update(other),
            },
        }
    }

    /// Resets every slot to its logged-out default, notifying subscribers
    /// slot by slot.
    pub fn reset(&mut self) {
        for key in StateKey::ALL {
            self.update(StateUpdate::default_for(key));
        }
    }

    fn merge_into(&mut self, key: StateKey, incoming: Vec<SyncRecord>) {
        let current = self.get(key).records();
        if current.is_empty() {
            self.update(StateUpdate::with_records(key, incoming));
            return;
        }
        let merged = merge::merge_records(current, incoming);
        self.update(StateUpdate::with_records(key, merged));
    }

    fn swap(&mut self, update: StateUpdate) -> StateUpdate {
        match update {
            StateUpdate::Appointments(records) => {
                StateUpdate::Appointments(mem::replace(&mut self.state.appointments, records))
            }
            StateUpdate::Messages(records) => {
                StateUpdate::Messages(mem::replace(&mut self.state.messages, records))
            }
            StateUpdate::Notifications(records) => {
                StateUpdate::Notifications(mem::replace(&mut self.state.notifications, records))
            }
            StateUpdate::User(user) => {
                StateUpdate::User(mem::replace(&mut self.state.user, user))
            }
            StateUpdate::Connectivity(online) => {
                StateUpdate::Connectivity(mem::replace(&mut self.state.is_online, online))
            }
        }
    }

    fn next_id(&mut self) -> u64 {
        let id = self.next_subscription;
        self.next_subscription += 1;
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    fn record(id: &str) -> SyncRecord {
        SyncRecord::new(id)
    }

    #[test]
    fn update_then_get_round_trips() {
        let mut store = StateStore::new();
        store.update(StateUpdate::Appointments(vec![record("a1")]));
        match store.get(StateKey::Appointments) {
            StateSlot::Records(records) => {
                assert_eq!(records.len(), 1);
                assert_eq!(records[0].id, "a1");
            }
            other => panic!("unexpected slot {other:?}"),
        }

        store.update(StateUpdate::Connectivity(true));
        assert!(store.state().is_online);
    }

    #[test]
    fn update_stamps_last_update() {
        let mut store = StateStore::new();
        let before = store.state().last_update;
        store.update(StateUpdate::Connectivity(true));
        assert!(store.state().last_update >= before);
    }

    #[test]
    fn subscriber_sees_new_and_previous_value() {
        let mut store = StateStore::new();
        store.update(StateUpdate::Appointments(vec![record("old")]));

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let _subscription = store.subscribe(
            StateKey::Appointments,
            Box::new(move |new_value, old_value| {
                sink.lock().unwrap().push((
                    new_value.records().first().map(|r| r.id.clone()),
                    old_value.records().first().map(|r| r.id.clone()),
                ));
                Ok(())
            }),
        );

        store.update(StateUpdate::Appointments(vec![record("new")]));
        let seen = seen.lock().unwrap();
        assert_eq!(
            seen.as_slice(),
            &[(Some("new".to_string()), Some("old".to_string()))]
        );
    }

    #[test]
    fn unsubscribed_callback_never_fires() {
        let mut store = StateStore::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let subscription = store.subscribe(
            StateKey::Connectivity,
            Box::new(move |_, _| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }),
        );

        store.update(StateUpdate::Connectivity(true));
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        store.unsubscribe(subscription);
        store.update(StateUpdate::Connectivity(false));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn failing_subscriber_does_not_block_later_ones() {
        let mut store = StateStore::new();
        let _failing = store.subscribe(
            StateKey::Appointments,
            Box::new(|_, _| Err(SubscriberError("component went away".into()))),
        );

        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let _second = store.subscribe(
            StateKey::Appointments,
            Box::new(move |_, _| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }),
        );

        store.update(StateUpdate::Appointments(vec![record("a1")]));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn wildcard_subscriber_sees_full_state_and_key() {
        let mut store = StateStore::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let _subscription = store.subscribe_all(Box::new(move |state, key| {
            sink.lock().unwrap().push((key, state.is_online));
            Ok(())
        }));

        store.update(StateUpdate::Connectivity(true));
        store.update(StateUpdate::Appointments(vec![record("a1")]));

        let seen = seen.lock().unwrap();
        assert_eq!(
            seen.as_slice(),
            &[
                (StateKey::Connectivity, true),
                (StateKey::Appointments, true)
            ]
        );
    }

    #[test]
    fn server_refresh_merges_into_existing_content() {
        let mut store = StateStore::new();
        let mut local = record("a1");
        local.local_only = true;
        store.update(StateUpdate::Appointments(vec![local]));

        store.smart_update(
            StateUpdate::Appointments(vec![record("a2")]),
            UpdateSource::Server,
        );

        let records = store.get(StateKey::Appointments).records();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].id, "a2");
        assert!(records[1].local_only, "optimistic record must survive");
    }

    #[test]
    fn server_refresh_overwrites_empty_slot() {
        let mut store = StateStore::new();
        store.smart_update(
            StateUpdate::Appointments(vec![record("a1")]),
            UpdateSource::Server,
        );
        assert_eq!(store.get(StateKey::Appointments).records().len(), 1);
    }

    #[test]
    fn local_write_overwrites_directly() {
        let mut store = StateStore::new();
        store.update(StateUpdate::Appointments(vec![record("a1"), record("a2")]));
        store.smart_update(
            StateUpdate::Appointments(vec![record("a3")]),
            UpdateSource::Local,
        );

        let records = store.get(StateKey::Appointments).records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id, "a3");
    }

    #[test]
    fn reset_restores_defaults_for_every_slot() {
        let mut store = StateStore::new();
        store.update(StateUpdate::Appointments(vec![record("a1")]));
        store.update(StateUpdate::Connectivity(true));
        store.update(StateUpdate::User(Some(
            medilink_bridge::records::UserRef {
                id: "u1".into(),
                display_name: None,
            },
        )));

        store.reset();

        assert!(store.state().appointments.is_empty());
        assert!(store.state().user.is_none());
        assert!(!store.state().is_online);
    }
}
