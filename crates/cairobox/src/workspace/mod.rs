//! Per-job workspaces
//!
//! Every compilation job gets an exclusively owned directory under the
//! configured root, named after a freshly generated job id. The directory is
//! removed when the job ends, either through an explicit
//! [`Workspace::cleanup`] or, as a fallback, when the guard is dropped.

use std::path::{Component, Path, PathBuf};

use thiserror::Error;

pub use crate::workspace::manager::{JOB_DIR_PREFIX, Workspace, WorkspaceManager};

mod manager;

/// Errors that occur while preparing or removing a workspace
#[derive(Debug, Error)]
pub enum WorkspaceError {
    #[error("failed to create workspace at {path}: {source}")]
    CreateFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write {path}: {source}")]
    WriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to remove workspace {path}: {source}")]
    CleanupFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid path: {0}")]
    InvalidPath(String),

    #[error("workspace manager is shut down")]
    Closed,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Check that a workspace-relative path cannot escape the workspace
pub(crate) fn validate_relative(path: &Path) -> Result<(), WorkspaceError> {
    let mut has_normal = false;
    for component in path.components() {
        match component {
            Component::Normal(_) => has_normal = true,
            Component::CurDir => {}
            _ => {
                return Err(WorkspaceError::InvalidPath(format!(
                    "path escapes workspace: {}",
                    path.display()
                )));
            }
        }
    }

    if !has_normal {
        return Err(WorkspaceError::InvalidPath(format!(
            "empty path: {}",
            path.display()
        )));
    }
    Ok(())
}
