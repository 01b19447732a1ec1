use std::env;
use std::ffi::{OsStr, OsString};
use std::path::PathBuf;

use anyhow::{Context, Result};

/// Ordered module search path assembled by the caller.
///
/// Snapshot resolution hands back plain directories; composing them into an
/// interpreter search order (and pushing that order into `PYTHONPATH` or an
/// equivalent variable) is the caller's job, kept here so repeated
/// resolutions stay idempotent.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SearchPath {
    entries: Vec<PathBuf>,
}

impl SearchPath {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a `PATH`-style environment value, dropping empty segments.
    #[must_use]
    pub fn from_env_value(value: &OsStr) -> Self {
        let entries = env::split_paths(value)
            .filter(|entry| !entry.as_os_str().is_empty())
            .collect();
        Self { entries }
    }

    /// Put `dir` at the highest-priority position.
    ///
    /// An entry already present is moved to the front rather than duplicated,
    /// so prepending the same snapshot path twice leaves one entry.
    pub fn prepend(&mut self, dir: impl Into<PathBuf>) {
        let dir = dir.into();
        self.entries.retain(|existing| existing != &dir);
        self.entries.insert(0, dir);
    }

    #[must_use]
    pub fn entries(&self) -> &[PathBuf] {
        &self.entries
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Render the order as a `PATH`-style environment value.
    pub fn as_env_value(&self) -> Result<OsString> {
        env::join_paths(self.entries.iter())
            .context("search path entries must not contain the path separator")
    }
}
