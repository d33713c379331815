//! Storage collaborator seam for file-backed transfers.
//!
//! Only the splitter's file-backed path touches storage: each chunk is read
//! at its offset when its turn comes, so a file of any size is served with
//! one chunk buffer in memory.

use bytes::Bytes;
use thiserror::Error;

/// Errors reported by the storage collaborator.
#[non_exhaustive]
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// The named file does not exist.
    #[error("file {name} not found")]
    NotFound {
        /// Requested file name.
        name: String,
    },
    /// The read failed with a filesystem-specific code.
    #[error("error reading file {name} (code {code})")]
    ReadFailed {
        /// Requested file name.
        name: String,
        /// Filesystem status code.
        code: i32,
    },
}

/// Read-only file access used for static file serving.
pub trait Storage {
    /// Size of the named file in bytes.
    ///
    /// # Errors
    ///
    /// Returns a [`StorageError`] when the file is missing or unreadable.
    fn size(&self, name: &str) -> Result<usize, StorageError>;

    /// Read up to `len` bytes starting at `offset`.
    ///
    /// # Errors
    ///
    /// Returns a [`StorageError`] when the file is missing or the read fails.
    fn read(&self, name: &str, offset: usize, len: usize) -> Result<Bytes, StorageError>;
}
