//! Directory-backed blob storage.
//!
//! One file per document id under the owning collection's documents
//! directory. Writes are create-exclusive and fsynced before the caller
//! commits any metadata referencing the blob.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::debug;

/// Errors from blob operations.
#[derive(Debug, thiserror::Error)]
pub enum BlobError {
    /// No blob exists for the requested document id.
    #[error("blob not found: {id}")]
    NotFound {
        /// The document id that was looked up.
        id: String,
    },

    /// A blob for this document id already exists.
    #[error("blob already exists: {id}")]
    AlreadyExists {
        /// The conflicting document id.
        id: String,
    },

    /// Underlying filesystem failure.
    #[error("blob I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience alias used throughout the blob crate.
pub type Result<T> = std::result::Result<T, BlobError>;

/// Capability for persisting raw document bodies.
///
/// `directory` is the collection's documents directory; relative paths
/// are resolved against the store's root.
pub trait BlobStore: Send + Sync {
    /// Creates the directory (and parents) if missing.
    fn ensure_directory(&self, directory: &str) -> Result<()>;

    /// Writes a new blob. Fails with [`BlobError::AlreadyExists`] if a
    /// file for this id is already present; the data is fsynced before
    /// returning.
    fn write(&self, directory: &str, document_id: &str, data: &[u8]) -> Result<()>;

    /// Reads a blob or fails with [`BlobError::NotFound`].
    fn read(&self, directory: &str, document_id: &str) -> Result<Vec<u8>>;

    /// Unlinks a blob. A missing file is not an error.
    fn delete(&self, directory: &str, document_id: &str) -> Result<()>;
}

/// Filesystem implementation of [`BlobStore`] rooted at a data
/// directory.
#[derive(Debug, Clone)]
pub struct DirBlobStore {
    root: PathBuf,
}

impl DirBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, directory: &str) -> PathBuf {
        let dir = Path::new(directory);
        if dir.is_absolute() {
            dir.to_path_buf()
        } else {
            self.root.join(dir)
        }
    }

    fn blob_path(&self, directory: &str, document_id: &str) -> PathBuf {
        self.resolve(directory).join(document_id)
    }
}

impl BlobStore for DirBlobStore {
    fn ensure_directory(&self, directory: &str) -> Result<()> {
        let path = self.resolve(directory);
        fs::create_dir_all(&path)?;
        Ok(())
    }

    fn write(&self, directory: &str, document_id: &str, data: &[u8]) -> Result<()> {
        let path = self.blob_path(directory, document_id);

        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::AlreadyExists {
                    BlobError::AlreadyExists {
                        id: document_id.to_owned(),
                    }
                } else {
                    BlobError::Io(e)
                }
            })?;

        file.write_all(data)?;
        file.sync_all()?;
        debug!(document_id, bytes = data.len(), "blob written");
        Ok(())
    }

    fn read(&self, directory: &str, document_id: &str) -> Result<Vec<u8>> {
        let path = self.blob_path(directory, document_id);
        fs::read(&path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                BlobError::NotFound {
                    id: document_id.to_owned(),
                }
            } else {
                BlobError::Io(e)
            }
        })
    }

    fn delete(&self, directory: &str, document_id: &str) -> Result<()> {
        let path = self.blob_path(directory, document_id);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(BlobError::Io(e)),
        }
    }
}
