use alloc::string::String;
use alloc::vec::Vec;
use std::io::ErrorKind;
use std::path::PathBuf;

use super::{FileStorage, StorageError};

/// A [`FileStorage`] on the host file system, rooted at a directory
#[derive(Clone, Debug)]
pub struct FsStorage {
    root: PathBuf,
    read_only: bool,
}

impl FsStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            read_only: false,
        }
    }

    pub fn read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }
}

fn map_err(e: std::io::Error) -> StorageError {
    match e.kind() {
        ErrorKind::NotFound => StorageError::NotFound,
        ErrorKind::PermissionDenied => StorageError::ReadOnly,
        _ => StorageError::Io,
    }
}

impl FileStorage for FsStorage {
    fn is_read_only(&self) -> bool {
        self.read_only
    }

    fn read(&mut self, path: &str) -> Result<Vec<u8>, StorageError> {
        std::fs::read(self.root.join(path)).map_err(map_err)
    }

    fn write(&mut self, path: &str, data: &[u8]) -> Result<(), StorageError> {
        if self.read_only {
            return Err(StorageError::ReadOnly);
        }
        let target = self.root.join(path);
        let mut tmp = target.clone().into_os_string();
        tmp.push(".tmp");
        // Write-then-rename, the target is never partially written
        std::fs::write(&tmp, data).map_err(map_err)?;
        std::fs::rename(&tmp, &target).map_err(map_err)
    }

    fn remove(&mut self, path: &str) -> Result<(), StorageError> {
        if self.read_only {
            return Err(StorageError::ReadOnly);
        }
        std::fs::remove_file(self.root.join(path)).map_err(map_err)
    }

    fn exists(&mut self, path: &str) -> bool {
        self.root.join(path).is_file()
    }

    fn list(&mut self, dir: &str) -> Result<Vec<String>, StorageError> {
        let mut files = Vec::new();
        for entry in std::fs::read_dir(self.root.join(dir)).map_err(map_err)? {
            let entry = entry.map_err(map_err)?;
            if entry.path().is_file() {
                let name = entry.file_name().to_string_lossy().into_owned();
                files.push(if dir.is_empty() { name } else { std::format!("{}/{}", dir.trim_end_matches('/'), name) });
            }
        }
        files.sort();
        Ok(files)
    }
}
