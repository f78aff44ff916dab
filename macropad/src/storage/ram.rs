use alloc::collections::BTreeMap;
use alloc::string::{String, ToString};
use alloc::vec::Vec;

use super::{FileStorage, StorageError};

/// A [`FileStorage`] kept in RAM, used when no persistent medium is available and in tests
#[derive(Clone, Debug, Default)]
pub struct RamStorage {
    files: BTreeMap<String, Vec<u8>>,
    read_only: bool,
}

impl RamStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(mut self, path: &str, data: impl AsRef<[u8]>) -> Self {
        self.files.insert(path.to_string(), data.as_ref().to_vec());
        self
    }

    pub fn set_read_only(&mut self, read_only: bool) {
        self.read_only = read_only;
    }

    /// Content of a file, for inspection
    pub fn file(&self, path: &str) -> Option<&[u8]> {
        self.files.get(path).map(Vec::as_slice)
    }
}

impl FileStorage for RamStorage {
    fn is_read_only(&self) -> bool {
        self.read_only
    }

    fn read(&mut self, path: &str) -> Result<Vec<u8>, StorageError> {
        self.files.get(path).cloned().ok_or(StorageError::NotFound)
    }

    fn write(&mut self, path: &str, data: &[u8]) -> Result<(), StorageError> {
        if self.read_only {
            return Err(StorageError::ReadOnly);
        }
        self.files.insert(path.to_string(), data.to_vec());
        Ok(())
    }

    fn remove(&mut self, path: &str) -> Result<(), StorageError> {
        if self.read_only {
            return Err(StorageError::ReadOnly);
        }
        self.files.remove(path).map(|_| ()).ok_or(StorageError::NotFound)
    }

    fn exists(&mut self, path: &str) -> bool {
        self.files.contains_key(path)
    }

    fn list(&mut self, dir: &str) -> Result<Vec<String>, StorageError> {
        let prefix = dir.trim_end_matches('/');
        Ok(self
            .files
            .keys()
            .filter(|path| match path.rsplit_once('/') {
                Some((parent, _)) => parent == prefix,
                None => prefix.is_empty(),
            })
            .cloned()
            .collect())
    }
}
