/*++

Licensed under the Apache-2.0 license.

File Name:

    store.rs

Abstract:

    File contains the flash file backed keyword store and the minimum ship
    level reset flag.

--*/

use crate::*;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

fn io_err(path: &Path, err: std::io::Error) -> LidError {
    LidError::Io {
        path: path.display().to_string(),
        reason: err.to_string(),
    }
}

/// Keyword store keeping one file per key, named `<record>.<keyword>`
#[derive(Debug, Clone)]
pub struct FlashStore {
    dir: PathBuf,
}

impl FlashStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path(&self, key: &PolicyKey) -> PathBuf {
        self.dir.join(format!("{}.{}", key.record, key.keyword))
    }
}

impl KeywordStore for FlashStore {
    fn read(&self, key: &PolicyKey) -> LidResult<Vec<u8>> {
        let path = self.path(key);
        match std::fs::read(&path) {
            Ok(value) => Ok(value),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(LidError::PolicyStoreUnavailable {
                key: key.to_string(),
                reason: format!("{}: {e}", path.display()),
            }),
        }
    }

    fn write(&self, key: &PolicyKey, value: &[u8]) -> LidResult<()> {
        let path = self.path(key);
        let unavailable = |e: std::io::Error| LidError::PolicyStoreUnavailable {
            key: key.to_string(),
            reason: format!("{}: {e}", path.display()),
        };
        std::fs::create_dir_all(&self.dir).map_err(unavailable)?;
        std::fs::write(&path, value).map_err(unavailable)
    }
}

/// Marker file requesting a minimum ship level reset
#[derive(Debug, Clone)]
pub struct ResetFlagFile {
    path: PathBuf,
}

impl ResetFlagFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    pub fn create(&self) -> LidResult<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
        }
        std::fs::File::create(&self.path)
            .map(|_| ())
            .map_err(|e| io_err(&self.path, e))
    }

    pub fn remove(&self) -> LidResult<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(io_err(&self.path, e)),
        }
    }
}
