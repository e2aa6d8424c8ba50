//! The document store contract.
//!
//! Stores are only ever driven from write-back actions, which all run on the
//! writer's single worker, but implementations must still be safe to share
//! with loaders running on other threads.

use std::sync::OnceLock;

use regex::Regex;

use crate::document::Document;
use crate::error::{ConfigError, StorageError};
use crate::serializable::Serializable;

/// Load/save/remove of named documents.
pub trait DocumentStore: Send + Sync {
    /// Loads the document stored under `name`.
    ///
    /// # Errors
    /// - `NotFound`: nothing is stored under `name`
    /// - `Corrupt`: the stored bytes do not decode to a document
    fn load(&self, name: &str) -> Result<Document, StorageError>;

    /// Serializes `object` and stores it under `name`, replacing any previous
    /// document. Returns the encoded size in bytes.
    ///
    /// # Errors
    /// - `Document`: the object failed to serialize
    /// - `TooLarge`: the encoded document exceeds the configured limit
    /// - `Io`/`Backend`: the backend failed
    fn save(&self, name: &str, object: &dyn Serializable) -> Result<usize, StorageError>;

    /// Removes the document stored under `name`.
    ///
    /// # Errors
    /// - `NotFound`: nothing is stored under `name`
    fn remove(&self, name: &str) -> Result<(), StorageError>;

    /// Loads `name` and restores `object` from it.
    ///
    /// # Errors
    /// Everything `load` reports, plus the object's own deserialize failure
    /// (in which case the object is left unchanged).
    fn restore(&self, name: &str, object: &mut dyn Serializable) -> Result<(), StorageError> {
        let doc = self.load(name)?;
        object.deserialize(&doc)?;
        Ok(())
    }
}

/// Configuration shared by the bundled stores.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Largest encoded document accepted by `save` or `load` (bytes).
    pub max_document_size: usize,
    /// Whether file-backed stores fsync before replacing a document.
    pub sync_on_write: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            max_document_size: 1024 * 1024, // 1 MiB
            sync_on_write: true,
        }
    }
}

impl StoreConfig {
    const MIN_DOCUMENT_SIZE: usize = 64;

    /// Checks the configuration, returning it unchanged when valid.
    ///
    /// # Errors
    /// Rejects a `max_document_size` below 64 bytes.
    pub fn validate(self) -> Result<Self, ConfigError> {
        if self.max_document_size < Self::MIN_DOCUMENT_SIZE {
            return Err(ConfigError::InvalidField {
                field: "max_document_size",
                reason: format!(
                    "must be at least {} bytes (got {})",
                    Self::MIN_DOCUMENT_SIZE,
                    self.max_document_size
                ),
            });
        }
        Ok(self)
    }
}

fn name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_.-]{0,127}$").unwrap_or_else(|e| {
            unreachable!("document name pattern is a valid regex: {e}")
        })
    })
}

/// Rejects names that could escape a store directory or collide with its
/// temporary files.
///
/// # Errors
/// Returns `InvalidName` for names that are empty, longer than 128
/// characters, start with a non-alphanumeric character, contain anything
/// other than ASCII alphanumerics, `_`, `.` and `-`, or end in `.tmp`.
pub fn validate_name(name: &str) -> Result<(), StorageError> {
    if name_pattern().is_match(name) && !name.ends_with(".tmp") {
        Ok(())
    } else {
        Err(StorageError::InvalidName {
            name: name.to_string(),
        })
    }
}

/// Serializes `object` into a fresh document and encodes it as JSON,
/// enforcing the configured size limit.
pub(crate) fn render(
    name: &str,
    object: &dyn Serializable,
    config: &StoreConfig,
) -> Result<Vec<u8>, StorageError> {
    validate_name(name)?;

    let mut doc = Document::new();
    object.serialize(&mut doc)?;

    let bytes = serde_json::to_vec(&doc)
        .map_err(|e| StorageError::Backend(format!("failed to encode '{name}': {e}")))?;
    if bytes.len() > config.max_document_size {
        return Err(StorageError::TooLarge {
            name: name.to_string(),
            size: bytes.len(),
            max: config.max_document_size,
        });
    }
    Ok(bytes)
}

/// Decodes stored JSON back into a document.
pub(crate) fn parse(name: &str, bytes: &[u8]) -> Result<Document, StorageError> {
    serde_json::from_slice::<Document>(bytes).map_err(|e| StorageError::Corrupt {
        name: name.to_string(),
        reason: e.to_string(),
    })
}
