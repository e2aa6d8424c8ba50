//! The capability contract for objects whose state is persisted.

use std::sync::{Arc, Mutex, RwLock};

use crate::document::Document;
use crate::error::DocumentError;

/// An object that can render its persisted fields into a [`Document`] and,
/// optionally, restore them from one.
///
/// Each object writes into the scope it is handed; callers that persist
/// several objects into one document give each its own child scope
/// (see [`DocumentExt::scope_mut`](crate::DocumentExt::scope_mut)).
pub trait Serializable {
    /// Writes this object's persisted fields into `doc`.
    ///
    /// # Errors
    /// Fails when a field cannot be represented in a document.
    fn serialize(&self, doc: &mut Document) -> Result<(), DocumentError>;

    /// Restores this object's fields from `doc`.
    ///
    /// Write-only types keep the default, which reports
    /// [`DocumentError::Unsupported`]. Implementations must leave `self`
    /// untouched when they return an error.
    ///
    /// # Errors
    /// Fails on missing or malformed required fields.
    fn deserialize(&mut self, _doc: &Document) -> Result<(), DocumentError> {
        Err(DocumentError::Unsupported)
    }
}

impl<T: Serializable + ?Sized> Serializable for Box<T> {
    fn serialize(&self, doc: &mut Document) -> Result<(), DocumentError> {
        (**self).serialize(doc)
    }

    fn deserialize(&mut self, doc: &Document) -> Result<(), DocumentError> {
        (**self).deserialize(doc)
    }
}

// Shared state is usually what a registered write-back action captures.
// A poisoned lock still holds the last consistent value the owner wrote,
// so serialization reads through the poison.

impl<T: Serializable> Serializable for Mutex<T> {
    fn serialize(&self, doc: &mut Document) -> Result<(), DocumentError> {
        let guard = self.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        guard.serialize(doc)
    }

    fn deserialize(&mut self, doc: &Document) -> Result<(), DocumentError> {
        self.get_mut()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .deserialize(doc)
    }
}

impl<T: Serializable> Serializable for RwLock<T> {
    fn serialize(&self, doc: &mut Document) -> Result<(), DocumentError> {
        let guard = self.read().unwrap_or_else(std::sync::PoisonError::into_inner);
        guard.serialize(doc)
    }

    fn deserialize(&mut self, doc: &Document) -> Result<(), DocumentError> {
        self.get_mut()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .deserialize(doc)
    }
}

// Restoring needs exclusive access; a shared `Arc` reports `Unsupported`.
// Wrap the value in a lock to restore it while it is shared.
impl<T: Serializable + ?Sized> Serializable for Arc<T> {
    fn serialize(&self, doc: &mut Document) -> Result<(), DocumentError> {
        (**self).serialize(doc)
    }

    fn deserialize(&mut self, doc: &Document) -> Result<(), DocumentError> {
        Arc::get_mut(self)
            .ok_or(DocumentError::Unsupported)?
            .deserialize(doc)
    }
}
