//! Failure reporting for write-back actions.
//!
//! Actions have no caller to return an error to, so failures are handed to a
//! [`FailureObserver`]. The default observer writes them to the `log` facade.

use std::any::Any;
use std::fmt;

use chrono::{DateTime, Utc};

use super::WriterHandle;

/// How an action failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureKind {
    /// The action returned an error.
    Error(String),
    /// The action panicked; the payload message if it was a string.
    Panic(String),
}

impl FailureKind {
    pub(crate) fn from_panic(payload: &(dyn Any + Send)) -> Self {
        Self::Panic(panic_message(payload))
    }
}

/// Message carried by a panic payload, if it was a string.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "non-string panic payload".to_string())
}

/// A single failed run of a registered action.
#[derive(Debug, Clone)]
pub struct ActionFailure {
    /// Handle of the failed registration.
    pub handle: WriterHandle,
    /// Registered name, or `action-<index>` for unnamed registrations.
    pub name: String,
    /// Error or panic message.
    pub kind: FailureKind,
    /// When the run finished.
    pub failed_at: DateTime<Utc>,
}

impl fmt::Display for ActionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            FailureKind::Error(msg) => {
                write!(f, "write-back action '{}' ({}) failed: {msg}", self.name, self.handle)
            }
            FailureKind::Panic(msg) => {
                write!(f, "write-back action '{}' ({}) panicked: {msg}", self.name, self.handle)
            }
        }
    }
}

/// Receives failures from the write-back worker.
///
/// Called on the worker thread between actions; implementations should be
/// quick and must not flag or register on the same writer while blocking.
pub trait FailureObserver: Send + Sync {
    /// Handles one failed run.
    fn on_failure(&self, failure: &ActionFailure);
}

/// Reports failures at `error` level through the `log` facade.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogObserver;

impl FailureObserver for LogObserver {
    fn on_failure(&self, failure: &ActionFailure) {
        log::error!("{failure}");
    }
}

impl<F> FailureObserver for F
where
    F: Fn(&ActionFailure) + Send + Sync,
{
    fn on_failure(&self, failure: &ActionFailure) {
        self(failure);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_panic_payloads() {
        let boxed: Box<dyn Any + Send> = Box::new("static message");
        assert_eq!(
            FailureKind::from_panic(boxed.as_ref()),
            FailureKind::Panic("static message".to_string())
        );

        let boxed: Box<dyn Any + Send> = Box::new(format!("formatted {}", 7));
        assert_eq!(
            FailureKind::from_panic(boxed.as_ref()),
            FailureKind::Panic("formatted 7".to_string())
        );

        let boxed: Box<dyn Any + Send> = Box::new(42u32);
        assert!(matches!(FailureKind::from_panic(boxed.as_ref()), FailureKind::Panic(_)));
    }

    #[test]
    fn test_display_names_the_action() {
        let failure = ActionFailure {
            handle: WriterHandle::new(3),
            name: "settings".to_string(),
            kind: FailureKind::Error("disk full".to_string()),
            failed_at: Utc::now(),
        };
        let msg = failure.to_string();
        assert!(msg.contains("settings"));
        assert!(msg.contains("#3"));
        assert!(msg.contains("disk full"));
    }

    #[test]
    fn test_closures_are_observers() {
        let seen = std::sync::Mutex::new(Vec::new());
        let observer = |f: &ActionFailure| seen.lock().unwrap().push(f.name.clone());
        observer.on_failure(&ActionFailure {
            handle: WriterHandle::new(0),
            name: "a".to_string(),
            kind: FailureKind::Panic("boom".to_string()),
            failed_at: Utc::now(),
        });
        assert_eq!(seen.lock().unwrap().as_slice(), ["a".to_string()]);
    }
}
