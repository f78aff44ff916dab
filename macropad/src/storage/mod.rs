//! Persistent file storage used for settings, the macro tree and the USB marker file.
mod ram;
#[cfg(feature = "std")]
mod fs;

use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;

#[cfg(feature = "std")]
pub use fs::FsStorage;
pub use ram::RamStorage;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StorageError {
    NotFound,
    /// The medium is mounted read-only, e.g. while it's exposed as a USB drive
    ReadOnly,
    Io,
    /// The stored bytes could not be decoded
    Corrupted,
    Full,
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            StorageError::NotFound => "file not found",
            StorageError::ReadOnly => "storage is read-only",
            StorageError::Io => "storage io error",
            StorageError::Corrupted => "stored data is corrupted",
            StorageError::Full => "storage is full",
        };
        f.write_str(msg)
    }
}

/// A small flat file system.
///
/// Implementations must make [`FileStorage::write`] atomic: after an interruption the file holds
/// either the old or the new content.
pub trait FileStorage {
    /// `true` if writes will fail, the firmware checks this before attempting one
    fn is_read_only(&self) -> bool;

    fn read(&mut self, path: &str) -> Result<Vec<u8>, StorageError>;

    fn write(&mut self, path: &str, data: &[u8]) -> Result<(), StorageError>;

    fn remove(&mut self, path: &str) -> Result<(), StorageError>;

    fn exists(&mut self, path: &str) -> bool {
        self.read(path).is_ok()
    }

    /// List the files in `dir`, as paths usable with [`FileStorage::read`]
    fn list(&mut self, dir: &str) -> Result<Vec<String>, StorageError>;
}
