use std::io;
use std::path::{Path, PathBuf};

use crate::git::GitError;

/// Failures surfaced while registering dev repositories or resolving
/// snapshot import paths.
///
/// A failed materialization never leaves a snapshot directory behind: the
/// staged clone is removed before the error propagates.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("commit must be a full 40-character lowercase hex SHA-1 (got '{commit}')")]
    InvalidCommit { commit: String },
    #[error("repository name must be a single path segment (got '{name}')")]
    InvalidRepoName { name: String },
    #[error("inner path must be relative without '..' (got '{path}')")]
    InvalidInnerPath { path: String },
    #[error("'{inner}' is not a directory under snapshot {}", .snapshot.display())]
    MissingInnerPath { inner: String, snapshot: PathBuf },
    #[error(transparent)]
    Git(#[from] GitError),
    #[error("{op} {}: {source}", .path.display())]
    Io {
        op: &'static str,
        path: PathBuf,
        source: io::Error,
    },
}

pub type Result<T> = std::result::Result<T, StoreError>;

pub(crate) fn io_error(op: &'static str, path: &Path) -> impl FnOnce(io::Error) -> StoreError {
    let path = path.to_path_buf();
    move |source| StoreError::Io { op, path, source }
}
