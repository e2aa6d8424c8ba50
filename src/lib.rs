//! # writeback - Deferred, coalescing persistence
//!
//! Latency-sensitive code (render loops, control handlers, audio callbacks)
//! must not block on slow storage. writeback lets such code request a save
//! with a single non-blocking call and performs the actual write later on a
//! dedicated background worker, collapsing bursts of requests into one write.
//!
//! ## Core Concepts
//!
//! - **DeferredWriter**: owns the worker and the registry of write-back actions
//! - **WriterHandle**: stable handle returned by registration, used to flag
//! - **Serializable**: the contract objects implement to persist their fields
//! - **Document**: the JSON object a serializable renders into
//! - **DocumentStore**: the load/save/remove boundary actions write through
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::{Arc, Mutex};
//! use writeback::{DeferredWriter, DocumentStore, InMemoryDocumentStore, WriterConfig};
//!
//! let store = Arc::new(InMemoryDocumentStore::new());
//! let settings = Arc::new(Mutex::new(Settings::default()));
//! let writer = DeferredWriter::new(WriterConfig::default())?;
//!
//! let handle = writer.register_named("settings", {
//!     let (store, settings) = (Arc::clone(&store), Arc::clone(&settings));
//!     move || store.save("settings", &*settings).map(drop).map_err(Into::into)
//! });
//!
//! // From the hot path: returns immediately.
//! writer.flag(handle);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod convert;
pub mod document;
pub mod error;
pub mod serializable;
pub mod storage;
pub mod writer;

// Re-export primary types at crate root for convenience
pub use convert::{Palette16, Rgb, MAX_PACKED, PALETTE_SIZE};
pub use document::{Document, DocumentExt, DocumentValue};
pub use error::{
    ConfigError, ConversionError, DocumentError, StorageError, WritebackError, WritebackResult,
};
pub use serializable::Serializable;
pub use storage::{DocumentStore, InMemoryDocumentStore, StoreConfig};
pub use writer::{
    ActionFailure, ActionResult, ActionState, BoxError, DeferredWriter, FailureKind,
    FailureObserver, LogObserver, WriterConfig, WriterHandle, WriterStats,
};

#[cfg(feature = "persistent")]
pub use storage::FileDocumentStore;
