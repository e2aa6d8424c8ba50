//! File-backed document store.
//!
//! One file per document under a directory, named `<name>.doc`. Saves write a
//! `<name>.doc.tmp` sibling, optionally fsync it, then rename it over the
//! target, so readers see either the old or the new document.

use std::fs::{self, File};
use std::io::{BufReader, ErrorKind, Write};
use std::path::{Path, PathBuf};

use crate::document::Document;
use crate::error::StorageError;
use crate::serializable::Serializable;

use super::codec;
use super::traits::{parse, render, validate_name, DocumentStore, StoreConfig};

const EXTENSION: &str = "doc";

/// [`DocumentStore`] keeping each document in its own file.
#[derive(Debug)]
pub struct FileDocumentStore {
    dir: PathBuf,
    config: StoreConfig,
}

impl FileDocumentStore {
    /// Opens (creating if needed) a store rooted at `dir`.
    ///
    /// # Errors
    /// Fails if the configuration is invalid or the directory cannot be created.
    pub fn open(dir: impl AsRef<Path>, config: StoreConfig) -> Result<Self, StorageError> {
        let config = config.validate()?;
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir, config })
    }

    /// Directory the store writes into.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the file backing `name`.
    ///
    /// # Errors
    /// Returns `InvalidName` for names that fail validation.
    pub fn path_for(&self, name: &str) -> Result<PathBuf, StorageError> {
        validate_name(name)?;
        Ok(self.dir.join(format!("{name}.{EXTENSION}")))
    }

    fn not_found(name: &str) -> StorageError {
        StorageError::NotFound {
            name: name.to_string(),
        }
    }
}

impl DocumentStore for FileDocumentStore {
    fn load(&self, name: &str) -> Result<Document, StorageError> {
        let path = self.path_for(name)?;
        let file = match File::open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => return Err(Self::not_found(name)),
            Err(e) => return Err(e.into()),
        };

        let mut reader = BufReader::new(file);
        let bytes = codec::decode(&mut reader, self.config.max_document_size).map_err(|e| {
            match e.kind() {
                ErrorKind::InvalidData | ErrorKind::UnexpectedEof => StorageError::Corrupt {
                    name: name.to_string(),
                    reason: e.to_string(),
                },
                _ => StorageError::Io(e),
            }
        })?;
        parse(name, &bytes)
    }

    fn save(&self, name: &str, object: &dyn Serializable) -> Result<usize, StorageError> {
        let path = self.path_for(name)?;
        let bytes = render(name, object, &self.config)?;
        let framed = codec::encode(&bytes)?;

        let tmp_path = path.with_extension(format!("{EXTENSION}.tmp"));
        let written = (|| -> std::io::Result<()> {
            let mut file = File::create(&tmp_path)?;
            file.write_all(&framed)?;
            if self.config.sync_on_write {
                file.sync_all()?;
            }
            fs::rename(&tmp_path, &path)
        })();

        if let Err(e) = written {
            let _ = fs::remove_file(&tmp_path);
            return Err(e.into());
        }

        log::debug!("saved '{name}' ({} bytes) to {}", bytes.len(), path.display());
        Ok(bytes.len())
    }

    fn remove(&self, name: &str) -> Result<(), StorageError> {
        let path = self.path_for(name)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(Self::not_found(name)),
            Err(e) => Err(e.into()),
        }
    }
}
