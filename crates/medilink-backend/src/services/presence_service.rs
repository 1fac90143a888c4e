//! Application of socket presence events to the tracker.

use medilink_bridge::socket::SocketEvent;
use medilink_store::presence::PresenceTracker;

/// Applies one presence event. Returns whether the online set changed, so
/// the caller only broadcasts real changes.
pub(crate) fn apply_presence_event(tracker: &mut PresenceTracker, event: &SocketEvent) -> bool {
    match event {
        SocketEvent::UsersOnline(ids) => tracker.replace_all(ids.iter().cloned()),
        SocketEvent::UserJoined(id) => tracker.join(id.clone()),
        SocketEvent::UserLeft(id) => tracker.leave(id),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn presence_events_drive_the_tracker() {
        let mut tracker = PresenceTracker::new();

        assert!(apply_presence_event(
            &mut tracker,
            &SocketEvent::UsersOnline(vec!["p1".into(), "p2".into()])
        ));
        assert!(apply_presence_event(
            &mut tracker,
            &SocketEvent::UserLeft("p2".into())
        ));
        assert!(tracker.is_online("p1"));
        assert!(!tracker.is_online("p2"));
    }

    #[test]
    fn non_presence_events_change_nothing() {
        let mut tracker = PresenceTracker::new();
        assert!(!apply_presence_event(&mut tracker, &SocketEvent::Connected));
        assert!(!apply_presence_event(
            &mut tracker,
            &SocketEvent::Disconnected
        ));
    }
}
