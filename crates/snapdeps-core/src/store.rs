use std::fs;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use snapdeps_domain::{expand_user, Settings};
use tracing::{debug, warn};

use crate::error::{io_error, Result, StoreError};
use crate::git::{GitClient, SystemGit};
use crate::lock::SnapshotLock;

const LOCKS_DIR: &str = ".locks";

/// Two-tier cache of git working copies.
///
/// The dev tier (`dev_dir`) holds one persistent clone per registered
/// repository and is the only place upstream is ever contacted. The snapshot
/// tier (`snaps_dir`) holds immutable per-commit clones derived from the dev
/// tier; a snapshot directory that exists is complete and is handed back
/// without touching the version-control system again.
pub struct SnapshotStore {
    settings: Settings,
    git: Arc<dyn GitClient>,
}

impl SnapshotStore {
    #[must_use]
    pub fn new(settings: Settings) -> Self {
        Self::with_git_client(settings, Arc::new(SystemGit))
    }

    /// Construct with an explicit version-control collaborator.
    #[must_use]
    pub fn with_git_client(settings: Settings, git: Arc<dyn GitClient>) -> Self {
        Self { settings, git }
    }

    /// Construct from the on-disk configuration, creating it with platform
    /// defaults on first use.
    ///
    /// # Errors
    ///
    /// Returns an error when the configuration cannot be loaded or repaired.
    pub fn from_default_config() -> anyhow::Result<Self> {
        Ok(Self::new(Settings::load_default()?))
    }

    /// Location of the persistent dev clone for `local_name`.
    pub fn dev_repo_path(&self, local_name: &str) -> Result<PathBuf> {
        let name = validate_repo_name(local_name)?;
        Ok(self.dev_root().join(name))
    }

    /// Location the snapshot of `local_name` at `commit` occupies once built.
    pub fn snapshot_path(&self, local_name: &str, commit: &str) -> Result<PathBuf> {
        let name = validate_repo_name(local_name)?;
        let commit = validate_commit(commit)?;
        Ok(self.snaps_root().join(name).join(commit))
    }

    /// Register `local_name` by cloning `clone_url` into the dev tier.
    ///
    /// One-shot setup for a logical repository; the clone is kept across the
    /// life of the cache and fast-forwarded before each new snapshot.
    ///
    /// # Errors
    ///
    /// Returns an error when the name is not a single path segment or the
    /// clone fails (including when the destination already exists).
    pub fn add_dev_repo(&self, clone_url: &str, local_name: &str) -> Result<()> {
        let dest = self.dev_repo_path(local_name)?;
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).map_err(io_error("failed to create dev directory", parent))?;
        }
        debug!(%clone_url, dest = %dest.display(), "cloning dev repository");
        self.git.clone_url(clone_url, &dest)?;
        Ok(())
    }

    /// Resolve the import path for `local_name` pinned at `commit`, creating
    /// the snapshot working copy on first use.
    ///
    /// An empty `inner_rel_path` resolves to the snapshot root. The returned
    /// directory is suitable for prepending to a module search path; the
    /// store itself never mutates interpreter or process state.
    ///
    /// # Errors
    ///
    /// Returns an invalid-argument error before any version-control work when
    /// the commit is not a full lowercase hex SHA-1, the name is not a single
    /// path segment, or the inner path escapes the snapshot; returns a
    /// version-control error when the dev repository cannot be opened,
    /// pulled, or cloned, or the commit cannot be checked out.
    pub fn resolve_import_path(
        &self,
        local_name: &str,
        commit: &str,
        inner_rel_path: &str,
    ) -> Result<PathBuf> {
        let name = validate_repo_name(local_name)?;
        let commit = validate_commit(commit)?;
        let inner = normalize_inner_path(inner_rel_path)?;

        let snaps_root = self.snaps_root();
        let snapshot = snaps_root.join(name).join(commit);
        if snapshot.is_dir() {
            debug!(%name, %commit, "snapshot cache hit");
        } else {
            let _lock = SnapshotLock::acquire(&lock_path(&snaps_root, name, commit))?;
            if snapshot.is_dir() {
                debug!(%name, %commit, "snapshot cache hit");
            } else {
                debug!(%name, %commit, "snapshot cache miss");
                self.materialize(name, commit, &snapshot)?;
            }
        }

        let import_path = match &inner {
            Some(rel) => snapshot.join(rel),
            None => snapshot.clone(),
        };
        if !import_path.is_dir() {
            return Err(StoreError::MissingInnerPath {
                inner: inner_rel_path.to_string(),
                snapshot,
            });
        }
        Ok(import_path)
    }

    fn materialize(&self, name: &str, commit: &str, snapshot: &Path) -> Result<()> {
        let dev = self.dev_root().join(name);
        self.git.open_repository(&dev)?;
        self.git.pull(&dev)?;

        if let Some(parent) = snapshot.parent() {
            fs::create_dir_all(parent)
                .map_err(io_error("failed to create snapshot directory", parent))?;
        }
        let staging = snapshot.with_extension("partial");
        if staging.exists() {
            debug!(staging = %staging.display(), "removing stale partial snapshot");
            fs::remove_dir_all(&staging)
                .map_err(io_error("failed to remove stale partial snapshot", &staging))?;
        }

        let checked_out = self
            .git
            .clone_local(&dev, &staging)
            .and_then(|()| self.git.checkout(&staging, commit));
        if let Err(err) = checked_out {
            if staging.exists() {
                if let Err(cleanup) = fs::remove_dir_all(&staging) {
                    warn!(
                        staging = %staging.display(),
                        error = %cleanup,
                        "failed to remove partial snapshot after checkout failure"
                    );
                }
            }
            return Err(err.into());
        }

        fs::rename(&staging, snapshot)
            .map_err(io_error("failed to move snapshot into place", &staging))?;
        debug!(%name, %commit, path = %snapshot.display(), "snapshot created");
        Ok(())
    }

    fn dev_root(&self) -> PathBuf {
        expand_user(Path::new(self.settings.dev_dir()))
    }

    fn snaps_root(&self) -> PathBuf {
        expand_user(Path::new(self.settings.snaps_dir()))
    }
}

fn lock_path(snaps_root: &Path, name: &str, commit: &str) -> PathBuf {
    snaps_root
        .join(LOCKS_DIR)
        .join(name)
        .join(format!("{commit}.lock"))
}

fn validate_commit(commit: &str) -> Result<&str> {
    let is_hex = commit
        .bytes()
        .all(|byte| matches!(byte, b'0'..=b'9' | b'a'..=b'f'));
    if commit.len() != 40 || !is_hex {
        return Err(StoreError::InvalidCommit {
            commit: commit.to_string(),
        });
    }
    Ok(commit)
}

fn validate_repo_name(name: &str) -> Result<&str> {
    let mut components = Path::new(name).components();
    let single_normal = matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    );
    if !single_normal || name.contains('/') || name.contains('\\') {
        return Err(StoreError::InvalidRepoName {
            name: name.to_string(),
        });
    }
    Ok(name)
}

fn normalize_inner_path(inner: &str) -> Result<Option<PathBuf>> {
    if inner.is_empty() {
        return Ok(None);
    }
    let path = Path::new(inner);
    if path.is_absolute() {
        return Err(StoreError::InvalidInnerPath {
            path: inner.to_string(),
        });
    }
    let mut rel = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::Normal(part) => rel.push(part),
            _ => {
                return Err(StoreError::InvalidInnerPath {
                    path: inner.to_string(),
                })
            }
        }
    }
    if rel.as_os_str().is_empty() {
        return Ok(None);
    }
    Ok(Some(rel))
}
