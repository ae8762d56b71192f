//! Structured diagnostics produced while decoding.
//!
//! Recoverable problems (a sentinel that does not match, a record whose CRC
//! is off, an object type nobody registered a decoder for) are collected
//! here instead of aborting the read, so a single pass yields partial
//! results plus a complete report of what went wrong.

use std::fmt;

/// Severity of a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NotificationType {
    /// Suspicious data that was read anyway.
    Warning,
    /// Data that had to be skipped.
    Error,
    /// A type or feature the decoder does not handle.
    Unsupported,
}

impl fmt::Display for NotificationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Warning => write!(f, "Warning"),
            Self::Error => write!(f, "Error"),
            Self::Unsupported => write!(f, "Unsupported"),
        }
    }
}

/// One diagnostic entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub notification_type: NotificationType,
    pub message: String,
}

impl Notification {
    pub fn new(notification_type: NotificationType, message: impl Into<String>) -> Self {
        Self {
            notification_type,
            message: message.into(),
        }
    }
}

impl fmt::Display for Notification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.notification_type, self.message)
    }
}

/// Notifications gathered during one read.
#[derive(Debug, Clone, Default)]
pub struct NotificationCollection {
    items: Vec<Notification>,
}

impl NotificationCollection {
    pub fn new() -> Self {
        Self { items: Vec::new() }
    }

    /// Record a notification and mirror it to the `tracing` subscriber.
    pub fn notify(&mut self, notification_type: NotificationType, message: impl Into<String>) {
        let message = message.into();
        match notification_type {
            NotificationType::Warning => tracing::warn!(%message, "dwg decode warning"),
            NotificationType::Error => tracing::error!(%message, "dwg decode error"),
            NotificationType::Unsupported => tracing::debug!(%message, "dwg unsupported"),
        }
        self.items.push(Notification::new(notification_type, message));
    }

    /// Append an already-built notification.
    pub fn push(&mut self, notification: Notification) {
        self.notify(notification.notification_type, notification.message);
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Notification> {
        self.items.iter()
    }

    /// All notifications of one severity.
    pub fn of_type(&self, nt: NotificationType) -> Vec<&Notification> {
        self.items.iter().filter(|n| n.notification_type == nt).collect()
    }

    pub fn has_type(&self, nt: NotificationType) -> bool {
        self.items.iter().any(|n| n.notification_type == nt)
    }

    pub fn into_vec(self) -> Vec<Notification> {
        self.items
    }
}

impl Extend<Notification> for NotificationCollection {
    fn extend<T: IntoIterator<Item = Notification>>(&mut self, iter: T) {
        self.items.extend(iter);
    }
}

impl IntoIterator for NotificationCollection {
    type Item = Notification;
    type IntoIter = std::vec::IntoIter<Notification>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

impl<'a> IntoIterator for &'a NotificationCollection {
    type Item = &'a Notification;
    type IntoIter = std::slice::Iter<'a, Notification>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}
