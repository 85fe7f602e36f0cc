//! User-facing notification sink

use tracing::{info, warn};

/// Message shown when a session cannot be renewed.
pub const SESSION_EXPIRED_MESSAGE: &str = "Your session has expired. Please sign in again.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Success,
}

/// Where user-visible messages go (a toast, a status line, a log).
pub trait Notifier: Send + Sync {
    fn show(&self, message: &str, severity: Severity);
}

/// Notifier that writes messages to the tracing log.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn show(&self, message: &str, severity: Severity) {
        match severity {
            Severity::Error => warn!(message, "user notification"),
            Severity::Success => info!(message, "user notification"),
        }
    }
}
