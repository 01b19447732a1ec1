use std::path::{Path, PathBuf};
use std::process::{Command, Output};

/// Failures from the version-control collaborator.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum GitError {
    #[error("git is required but could not be invoked: {error}")]
    Unavailable { error: String },
    #[error("'{}' is not a git repository: {stderr}", .workdir.display())]
    NotARepository { workdir: PathBuf, stderr: String },
    #[error("git clone of '{origin}' into '{}' failed: {stderr}", .dest.display())]
    CloneFailed {
        origin: String,
        dest: PathBuf,
        stderr: String,
    },
    #[error("git pull in '{}' failed: {stderr}", .workdir.display())]
    PullFailed { workdir: PathBuf, stderr: String },
    #[error("git checkout of '{reference}' in '{}' failed: {stderr}", .workdir.display())]
    CheckoutFailed {
        reference: String,
        workdir: PathBuf,
        stderr: String,
    },
}

pub trait GitClient: Send + Sync {
    fn clone_url(&self, origin: &str, dest: &Path) -> Result<(), GitError>;
    fn clone_local(&self, origin: &Path, dest: &Path) -> Result<(), GitError>;
    fn open_repository(&self, workdir: &Path) -> Result<(), GitError>;
    fn pull(&self, workdir: &Path) -> Result<(), GitError>;
    fn checkout(&self, workdir: &Path, reference: &str) -> Result<(), GitError>;
}

/// Shells out to the `git` binary on `PATH`.
pub struct SystemGit;

impl GitClient for SystemGit {
    fn clone_url(&self, origin: &str, dest: &Path) -> Result<(), GitError> {
        let output = git_output(
            Command::new("git")
                .arg("clone")
                .arg("--quiet")
                .arg(origin)
                .arg(dest)
                .env("GIT_TERMINAL_PROMPT", "0"),
        )?;
        if !output.status.success() {
            return Err(GitError::CloneFailed {
                origin: origin.to_string(),
                dest: dest.to_path_buf(),
                stderr: stderr_text(&output),
            });
        }
        Ok(())
    }

    fn clone_local(&self, origin: &Path, dest: &Path) -> Result<(), GitError> {
        let output = git_output(
            Command::new("git")
                .arg("clone")
                .arg("--quiet")
                .arg(origin)
                .arg(dest),
        )?;
        if !output.status.success() {
            return Err(GitError::CloneFailed {
                origin: origin.display().to_string(),
                dest: dest.to_path_buf(),
                stderr: stderr_text(&output),
            });
        }
        Ok(())
    }

    fn open_repository(&self, workdir: &Path) -> Result<(), GitError> {
        let output = git_output(
            Command::new("git")
                .arg("-C")
                .arg(workdir)
                .arg("rev-parse")
                .arg("--git-dir"),
        )?;
        if !output.status.success() {
            return Err(GitError::NotARepository {
                workdir: workdir.to_path_buf(),
                stderr: stderr_text(&output),
            });
        }
        Ok(())
    }

    fn pull(&self, workdir: &Path) -> Result<(), GitError> {
        let output = git_output(
            Command::new("git")
                .arg("-C")
                .arg(workdir)
                .arg("pull")
                .arg("--ff-only")
                .arg("--quiet")
                .env("GIT_TERMINAL_PROMPT", "0"),
        )?;
        if !output.status.success() {
            return Err(GitError::PullFailed {
                workdir: workdir.to_path_buf(),
                stderr: stderr_text(&output),
            });
        }
        Ok(())
    }

    fn checkout(&self, workdir: &Path, reference: &str) -> Result<(), GitError> {
        let output = git_output(
            Command::new("git")
                .arg("-C")
                .arg(workdir)
                .arg("checkout")
                .arg("--quiet")
                .arg("--detach")
                .arg(reference),
        )?;
        if !output.status.success() {
            return Err(GitError::CheckoutFailed {
                reference: reference.to_string(),
                workdir: workdir.to_path_buf(),
                stderr: stderr_text(&output),
            });
        }
        Ok(())
    }
}

fn git_output(command: &mut Command) -> Result<Output, GitError> {
    command.output().map_err(|err| GitError::Unavailable {
        error: err.to_string(),
    })
}

fn stderr_text(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).trim().to_string()
}
