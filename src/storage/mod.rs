//! Document storage backends.
//!
//! [`DocumentStore`] is the I/O boundary write-back actions persist through.
//! Two implementations ship with the crate: [`InMemoryDocumentStore`] and,
//! behind the `persistent` feature, [`FileDocumentStore`].

mod memory;
mod traits;

#[cfg(feature = "persistent")]
mod codec;
#[cfg(feature = "persistent")]
mod file;

pub use memory::InMemoryDocumentStore;
pub use traits::{validate_name, DocumentStore, StoreConfig};

#[cfg(feature = "persistent")]
pub use file::FileDocumentStore;
