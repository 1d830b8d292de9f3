//! Notification dispatch
//!
//! Errors are handled where the operation started and turned into a
//! user-visible notification. The data layer never prints or renders
//! anything itself; it is handed a [`Notifier`].

use super::error::{FieldError, SheetError, GENERIC_FAILURE};
use std::sync::Mutex;
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Success,
    Warning,
    Error,
}

/// A transient message for the user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub severity: Severity,
    pub message: String,
    /// The user can close it
    pub dismissable: bool,
    /// A manual retry action should be offered
    pub retry: bool,
    /// Inline field errors, for validation failures
    pub fields: Vec<FieldError>,
}

impl Notification {
    pub fn new(severity: Severity, message: impl Into<String>) -> Self {
        Notification {
            severity,
            message: message.into(),
            dismissable: true,
            retry: false,
            fields: Vec::new(),
        }
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self::new(Severity::Success, message)
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self::new(Severity::Info, message)
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(Severity::Warning, message)
    }
}

impl SheetError {
    /// The notification shown for this error
    pub fn notification(&self) -> Notification {
        match self {
            SheetError::Transport(msg) => {
                Notification::new(Severity::Error, format!("Network error: {}", msg))
            }
            SheetError::MalformedResponse(_) => Notification {
                retry: true,
                ..Notification::new(
                    Severity::Error,
                    "Could not read data from the sheet. Please retry.",
                )
            },
            SheetError::Application(msg) => {
                let message = if msg.trim().is_empty() {
                    GENERIC_FAILURE.to_string()
                } else {
                    msg.clone()
                };
                Notification::new(Severity::Error, message)
            }
            SheetError::Validation(fields) => Notification {
                fields: fields.clone(),
                ..Notification::new(Severity::Warning, "Please correct the highlighted fields.")
            },
            SheetError::Config(msg) => {
                Notification::new(Severity::Error, format!("Configuration problem: {}", msg))
            }
            SheetError::Io(e) => Notification::new(Severity::Error, format!("File error: {}", e)),
        }
    }
}

/// Capability for surfacing notifications to the user
pub trait Notifier: Send + Sync {
    fn notify(&self, notification: Notification);
}

/// Writes notifications to the log (the developer-facing channel)
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, n: Notification) {
        match n.severity {
            Severity::Info | Severity::Success => info!(target: "notify", "{}", n.message),
            Severity::Warning => {
                let fields: Vec<String> = n.fields.iter().map(|f| f.to_string()).collect();
                warn!(target: "notify", fields = ?fields, "{}", n.message)
            }
            Severity::Error => error!(target: "notify", retry = n.retry, "{}", n.message),
        }
    }
}

/// Keeps every notification in memory, newest last
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    seen: Mutex<Vec<Notification>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn take(&self) -> Vec<Notification> {
        match self.seen.lock() {
            Ok(mut guard) => std::mem::take(&mut *guard),
            Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
        }
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notification: Notification) {
        match self.seen.lock() {
            Ok(mut guard) => guard.push(notification),
            Err(poisoned) => poisoned.into_inner().push(notification),
        }
    }
}
