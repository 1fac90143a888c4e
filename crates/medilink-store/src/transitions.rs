//! Detection of appointment status transitions across a refresh.
//!
//! The toast dispatcher only reacts to a small set of known transitions;
//! anything else — unknown statuses, records that appeared or vanished —
//! produces nothing.

use medilink_bridge::records::SyncRecord;

/// A recognized appointment status change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppointmentTransition {
    Confirmed,
    Cancelled,
    Completed,
    Rescheduled,
}

impl AppointmentTransition {
    /// Parses a server status string into a known transition target.
    pub fn from_status(status: &str) -> Option<Self> {
        match status {
            "confirmed" => Some(AppointmentTransition::Confirmed),
            "cancelled" => Some(AppointmentTransition::Cancelled),
            "completed" => Some(AppointmentTransition::Completed),
            "rescheduled" => Some(AppointmentTransition::Rescheduled),
            _ => None,
        }
    }
}

/// Compares two appointment lists by id and yields every record whose
/// `status` field changed to a known value.
///
/// Repeated identical transitions across successive refreshes yield repeated
/// entries by design — there is no deduplication at this layer.
pub fn appointment_transitions(
    previous: &[SyncRecord],
    current: &[SyncRecord],
) -> Vec<(String, AppointmentTransition)> {
    let mut transitions = Vec::new();
    for record in current {
        let Some(new_status) = record.field_str("status") else {
            continue;
        };
        let Some(previous_record) = previous.iter().find(|p| p.id == record.id) else {
            continue;
        };
        if previous_record.field_str("status") == Some(new_status) {
            continue;
        }
        if let Some(transition) = AppointmentTransition::from_status(new_status) {
            transitions.push((record.id.clone(), transition));
        }
    }
    transitions
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn with_status(id: &str, status: &str) -> SyncRecord {
        let mut record = SyncRecord::new(id);
        record.fields.insert("status".into(), json!(status));
        record
    }

    #[test]
    fn status_change_yields_a_transition() {
        let previous = vec![with_status("a1", "pending")];
        let current = vec![with_status("a1", "confirmed")];

        assert_eq!(
            appointment_transitions(&previous, &current),
            [("a1".to_string(), AppointmentTransition::Confirmed)]
        );
    }

    #[test]
    fn unknown_status_yields_nothing() {
        let previous = vec![with_status("a1", "pending")];
        let current = vec![with_status("a1", "under-review")];

        assert!(appointment_transitions(&previous, &current).is_empty());
    }

    #[test]
    fn unchanged_status_yields_nothing() {
        let previous = vec![with_status("a1", "confirmed")];
        let current = vec![with_status("a1", "confirmed")];

        assert!(appointment_transitions(&previous, &current).is_empty());
    }

    #[test]
    fn newly_appeared_record_yields_nothing() {
        let current = vec![with_status("a1", "cancelled")];
        assert!(appointment_transitions(&[], &current).is_empty());
    }

    #[test]
    fn multiple_changes_are_all_reported() {
        let previous = vec![
            with_status("a1", "pending"),
            with_status("a2", "confirmed"),
        ];
        let current = vec![
            with_status("a1", "cancelled"),
            with_status("a2", "completed"),
        ];

        assert_eq!(
            appointment_transitions(&previous, &current),
            [
                ("a1".to_string(), AppointmentTransition::Cancelled),
                ("a2".to_string(), AppointmentTransition::Completed),
            ]
        );
    }
}
