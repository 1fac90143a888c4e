/// Severity or category for user-visible toast notifications.
///
/// Classifies a toast by intent so the UI can pick its visual styling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationType {
    /// Neutral informational message.
    Info,
    /// A successful operation or positive outcome.
    Success,
    /// A non-critical condition the user should know about.
    Warning,
    /// An error or failure that may affect functionality.
    Error,
}

/// A toast payload intended for the user interface.
#[derive(Debug, Clone, PartialEq)]
pub struct NotificationMessage {
    /// Severity of the toast, determining its visual style.
    pub notification_type: NotificationType,
    /// The text content to display to the user.
    pub message: String,
}

impl NotificationMessage {
    pub fn new(notification_type: NotificationType, message: impl Into<String>) -> Self {
        Self {
            notification_type,
            message: message.into(),
        }
    }
}
