//! Mapping of state transitions to user-facing toasts.
//!
//! The mapping is fixed and deliberately dumb: known appointment transitions
//! and connectivity flips each get one canned message, and nothing here
//! throttles or deduplicates — two identical transitions produce two toasts.

use medilink_bridge::notification::{NotificationMessage, NotificationType};
use medilink_store::transitions::AppointmentTransition;

/// The toast for a recognized appointment transition.
pub(crate) fn appointment_toast(transition: AppointmentTransition) -> NotificationMessage {
    let (notification_type, message) = match transition {
        AppointmentTransition::Confirmed => (
            NotificationType::Success,
            "Your appointment has been confirmed.",
        ),
        AppointmentTransition::Cancelled => (
            NotificationType::Warning,
            "Your appointment has been cancelled.",
        ),
        AppointmentTransition::Completed => (
            NotificationType::Info,
            "Your appointment has been marked as completed.",
        ),
        AppointmentTransition::Rescheduled => (
            NotificationType::Info,
            "Your appointment has been rescheduled.",
        ),
    };
    NotificationMessage::new(notification_type, message)
}

/// The toast for a connectivity flip.
pub(crate) fn connectivity_toast(online: bool) -> NotificationMessage {
    if online {
        NotificationMessage::new(
            NotificationType::Success,
            "Back online. Syncing your changes.",
        )
    } else {
        NotificationMessage::new(
            NotificationType::Warning,
            "You are offline. Changes will be saved and synced later.",
        )
    }
}
