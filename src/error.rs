//! Error types for writeback.
//!
//! Every layer has its own strongly typed error (built with thiserror) so
//! callers can match on the precise condition, and `WritebackError` ties them
//! together for APIs that cross layers.

use thiserror::Error;

/// Errors raised while converting between document values and domain values.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConversionError {
    #[error("Expected {expected}, found {found}")]
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },

    #[error("Value {value} is out of range for {target}")]
    OutOfRange {
        value: String,
        target: &'static str,
    },

    #[error("Non-finite number cannot be represented in a document")]
    NonFinite,

    #[error("Expected an array of {expected} entries, found {actual}")]
    ShapeMismatch {
        expected: usize,
        actual: usize,
    },

    #[error("Entry {index}: {source}")]
    Entry {
        index: usize,
        #[source]
        source: Box<ConversionError>,
    },
}

/// Errors raised by the serializable contract.
#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("Required field '{field}' is missing")]
    MissingField {
        field: String,
    },

    #[error("Field '{field}' is invalid: {source}")]
    InvalidField {
        field: String,
        #[source]
        source: ConversionError,
    },

    #[error("Deserialization is not supported for this object")]
    Unsupported,
}

impl DocumentError {
    /// Wraps a conversion failure with the name of the field it happened on.
    pub fn invalid(field: impl Into<String>, source: ConversionError) -> Self {
        Self::InvalidField {
            field: field.into(),
            source,
        }
    }
}

/// Errors raised by document stores.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Document not found: {name}")]
    NotFound {
        name: String,
    },

    #[error("Document '{name}' is corrupt: {reason}")]
    Corrupt {
        name: String,
        reason: String,
    },

    #[error("Invalid document name: {name:?}")]
    InvalidName {
        name: String,
    },

    #[error("Document '{name}' is {size} bytes, exceeding the limit of {max}")]
    TooLarge {
        name: String,
        size: usize,
        max: usize,
    },

    #[error("Invalid store configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Storage backend error: {0}")]
    Backend(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Document(#[from] DocumentError),
}

impl StorageError {
    /// Returns true if the named document does not exist.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Returns true if the named document exists but cannot be decoded.
    #[must_use]
    pub const fn is_corrupt(&self) -> bool {
        matches!(self, Self::Corrupt { .. })
    }
}

/// Rejected configuration values.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("Field '{field}' is invalid: {reason}")]
    InvalidField {
        field: &'static str,
        reason: String,
    },
}

/// Top-level error type for writeback.
#[derive(Debug, Error)]
pub enum WritebackError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Conversion error: {0}")]
    Conversion(#[from] ConversionError),

    #[error("Document error: {0}")]
    Document(#[from] DocumentError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Failed to spawn write-back worker: {0}")]
    Spawn(#[source] std::io::Error),
}

impl WritebackError {
    /// Returns true if this is a configuration error.
    #[must_use]
    pub const fn is_config(&self) -> bool {
        matches!(self, Self::Config(_))
    }

    /// Returns true if this is a storage error.
    #[must_use]
    pub const fn is_storage(&self) -> bool {
        matches!(self, Self::Storage(_))
    }

    /// Returns true if this error came from (de)serializing an object.
    #[must_use]
    pub const fn is_document(&self) -> bool {
        matches!(self, Self::Document(_) | Self::Conversion(_))
    }
}

/// Result type alias for writeback operations.
pub type WritebackResult<T> = Result<T, WritebackError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shape_mismatch_message() {
        let err = ConversionError::ShapeMismatch { expected: 16, actual: 15 };
        let msg = format!("{err}");
        assert!(msg.contains("16"));
        assert!(msg.contains("15"));
    }

    #[test]
    fn test_invalid_field_keeps_source() {
        let err = DocumentError::invalid("color", ConversionError::NonFinite);
        let msg = format!("{err}");
        assert!(msg.contains("color"));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_storage_error_predicates() {
        let err = StorageError::NotFound { name: "settings".to_string() };
        assert!(err.is_not_found());
        assert!(!err.is_corrupt());

        let err = StorageError::Corrupt {
            name: "settings".to_string(),
            reason: "CRC mismatch".to_string(),
        };
        assert!(err.is_corrupt());
        assert!(format!("{err}").contains("CRC mismatch"));
    }

    #[test]
    fn test_writeback_error_from_layers() {
        let err: WritebackError = StorageError::NotFound { name: "x".to_string() }.into();
        assert!(err.is_storage());
        assert!(!err.is_document());

        let err: WritebackError = ConversionError::NonFinite.into();
        assert!(err.is_document());

        let err: WritebackError = ConfigError::InvalidField {
            field: "thread_name",
            reason: "must not be empty".to_string(),
        }
        .into();
        assert!(err.is_config());
        assert!(format!("{err}").contains("thread_name"));
    }

    #[test]
    fn test_io_error_converts_into_storage_error() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err: StorageError = io.into();
        assert!(matches!(err, StorageError::Io(_)));
    }
}
