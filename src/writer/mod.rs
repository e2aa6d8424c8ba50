//! Deferred, coalescing write-back.
//!
//! Time-critical code must never wait on slow storage. Instead of writing,
//! it flags a pre-registered action on a [`DeferredWriter`]; a single
//! background worker runs the action later. Any number of flags raised before
//! the worker gets to an action collapse into one run, and a flag raised while
//! the action is running schedules exactly one more run.

mod coordinator;
mod observer;
mod registry;

use std::fmt;

use serde::{Deserialize, Serialize};

pub use coordinator::{
    ActionResult, ActionState, BoxError, DeferredWriter, WriterConfig, WriterStats,
};
pub use observer::{ActionFailure, FailureKind, FailureObserver, LogObserver};

/// Stable handle of a registered action.
///
/// Handles are issued densely from 0 in registration order and stay valid for
/// the lifetime of the writer that issued them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct WriterHandle(usize);

impl WriterHandle {
    /// Wraps a raw registry index.
    #[must_use]
    pub const fn new(index: usize) -> Self {
        Self(index)
    }

    /// Position of the registration in the registry.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for WriterHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}
