#![deny(clippy::all, warnings)]

mod error;
mod git;
mod lock;
mod store;

pub use error::{Result, StoreError};
pub use git::{GitClient, GitError, SystemGit};
pub use store::SnapshotStore;
