//! Filesystem primitives under the snapshot `FileStore`.

use std::fs;
use std::io::{self, Write};
use std::path::Path;

use tempfile::NamedTempFile;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("snapshot directory unusable: {0}")]
    StoreDir(String),
    #[error("storage quota exceeded: need {needed} bytes, capacity {capacity}")]
    QuotaExceeded { needed: usize, capacity: usize },
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

impl PersistError {
    /// The target directory disappeared after it was prepared.
    pub(crate) fn is_missing_dir(&self) -> bool {
        matches!(self, PersistError::Io(err) if err.kind() == io::ErrorKind::NotFound)
    }
}

/// Creates `dir` when absent and rejects a path that is not a directory.
pub(crate) fn prepare_dir(dir: &Path) -> Result<(), PersistError> {
    match fs::metadata(dir) {
        Ok(meta) if meta.is_dir() => Ok(()),
        Ok(_) => Err(PersistError::StoreDir(format!(
            "{} is not a directory",
            dir.display()
        ))),
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            fs::create_dir_all(dir).map_err(|err| PersistError::StoreDir(err.to_string()))
        }
        Err(err) => Err(PersistError::StoreDir(err.to_string())),
    }
}

/// Swaps `content` into `target` through a synced sibling temp file, so a
/// reader sees either the previous snapshot or the new one.
pub(crate) fn replace_file(dir: &Path, target: &Path, content: &str) -> Result<(), PersistError> {
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(content.as_bytes())?;
    tmp.as_file_mut().sync_all()?;
    tmp.persist(target).map_err(|err| PersistError::Io(err.error))?;
    Ok(())
}
