//! In-memory document store.
//!
//! Keeps encoded documents in a map. Intended for embedded usage, tests, and
//! as a reference implementation of [`DocumentStore`].

use std::collections::HashMap;
use std::sync::RwLock;

use crate::document::Document;
use crate::error::{ConfigError, StorageError};
use crate::serializable::Serializable;

use super::traits::{parse, render, validate_name, DocumentStore, StoreConfig};

fn lock_err(context: &'static str) -> StorageError {
    StorageError::Backend(format!("poisoned lock: {context}"))
}

/// Thread-safe in-memory [`DocumentStore`].
#[derive(Debug, Default)]
pub struct InMemoryDocumentStore {
    config: StoreConfig,
    documents: RwLock<HashMap<String, Vec<u8>>>,
}

impl InMemoryDocumentStore {
    /// Creates an empty store with the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty store with a custom configuration.
    ///
    /// # Errors
    /// Fails if the configuration is invalid.
    pub fn with_config(config: StoreConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            config: config.validate()?,
            documents: RwLock::new(HashMap::new()),
        })
    }

    /// Number of stored documents.
    ///
    /// # Errors
    /// Fails if the map lock is poisoned.
    pub fn len(&self) -> Result<usize, StorageError> {
        let documents = self.documents.read().map_err(|_| lock_err("documents"))?;
        Ok(documents.len())
    }

    /// Returns true if no document is stored.
    ///
    /// # Errors
    /// Fails if the map lock is poisoned.
    pub fn is_empty(&self) -> Result<bool, StorageError> {
        Ok(self.len()? == 0)
    }

    /// Stores raw bytes under `name`, bypassing serialization.
    #[cfg(test)]
    pub(crate) fn insert_raw(&self, name: &str, bytes: Vec<u8>) {
        if let Ok(mut documents) = self.documents.write() {
            documents.insert(name.to_string(), bytes);
        }
    }
}

impl DocumentStore for InMemoryDocumentStore {
    fn load(&self, name: &str) -> Result<Document, StorageError> {
        validate_name(name)?;
        let documents = self.documents.read().map_err(|_| lock_err("documents"))?;
        let bytes = documents.get(name).ok_or_else(|| StorageError::NotFound {
            name: name.to_string(),
        })?;
        parse(name, bytes)
    }

    fn save(&self, name: &str, object: &dyn Serializable) -> Result<usize, StorageError> {
        let bytes = render(name, object, &self.config)?;
        let size = bytes.len();
        let mut documents = self.documents.write().map_err(|_| lock_err("documents"))?;
        documents.insert(name.to_string(), bytes);
        Ok(size)
    }

    fn remove(&self, name: &str) -> Result<(), StorageError> {
        validate_name(name)?;
        let mut documents = self.documents.write().map_err(|_| lock_err("documents"))?;
        documents
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| StorageError::NotFound {
                name: name.to_string(),
            })
    }
}
