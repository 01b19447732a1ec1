use std::fs::{self, File, OpenOptions};
use std::path::Path;

use fs4::FileExt;

use crate::error::{io_error, Result};

/// Exclusive advisory lock serializing creation of one snapshot path.
/// Dropping the guard releases it.
#[derive(Debug)]
pub(crate) struct SnapshotLock {
    _file: File,
}

impl SnapshotLock {
    pub(crate) fn acquire(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(io_error("failed to create lock directory", parent))?;
        }
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(true)
            .open(path)
            .map_err(io_error("failed to open lock file", path))?;
        file.lock_exclusive()
            .map_err(io_error("failed to lock", path))?;
        Ok(Self { _file: file })
    }
}
