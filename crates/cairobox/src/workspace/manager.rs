//! Workspace lifecycle management
//!
//! Creates, hands out, and removes per-job directories.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use crate::workspace::{WorkspaceError, validate_relative};

/// Name prefix of every job directory under the workspace root
pub const JOB_DIR_PREFIX: &str = "job-";

/// A job's private directory
///
/// # Cleanup
///
/// Call [`cleanup()`](Self::cleanup) once the job is done. If the guard is
/// dropped first (an error path that returned early, or a cancelled job
/// future), `Drop` removes the directory synchronously and logs a warning.
#[derive(Debug)]
pub struct Workspace {
    /// Job identifier
    job_id: String,

    /// Path to the job directory
    root: PathBuf,

    /// Whether the directory is still on disk
    active: bool,

    /// Concurrency permit held for the lifetime of the job
    _permit: Option<OwnedSemaphorePermit>,
}

impl Workspace {
    /// Create a fresh job directory under `parent`
    ///
    /// Fails if the directory already exists, so two jobs can never share one.
    #[instrument]
    pub async fn create(parent: &Path) -> Result<Self, WorkspaceError> {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|source| WorkspaceError::CreateFailed {
                path: parent.to_path_buf(),
                source,
            })?;

        let job_id = Uuid::new_v4().simple().to_string();
        let root = parent.join(format!("{JOB_DIR_PREFIX}{job_id}"));

        tokio::fs::create_dir(&root)
            .await
            .map_err(|source| WorkspaceError::CreateFailed {
                path: root.clone(),
                source,
            })?;

        debug!(job_id, root = %root.display(), "workspace created");

        Ok(Self {
            job_id,
            root,
            active: true,
            _permit: None,
        })
    }

    /// Get the job ID
    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    /// Get the path to the job directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Get the host path of a file inside the workspace
    ///
    /// Returns an error if the path is absolute or climbs out of the workspace.
    pub fn file_path(&self, relative: impl AsRef<Path>) -> Result<PathBuf, WorkspaceError> {
        let relative = relative.as_ref();
        validate_relative(relative)?;
        Ok(self.root.join(relative))
    }

    /// Write a file into the workspace, creating parent directories
    #[instrument(skip(self, content), fields(job_id = %self.job_id))]
    pub async fn write_file(
        &self,
        relative: impl AsRef<Path> + std::fmt::Debug,
        content: &[u8],
    ) -> Result<PathBuf, WorkspaceError> {
        let path = self.file_path(relative)?;

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| WorkspaceError::WriteFailed {
                    path: parent.to_path_buf(),
                    source,
                })?;
        }

        tokio::fs::write(&path, content)
            .await
            .map_err(|source| WorkspaceError::WriteFailed {
                path: path.clone(),
                source,
            })?;

        debug!(path = %path.display(), len = content.len(), "wrote file to workspace");
        Ok(path)
    }

    /// Remove the job directory
    ///
    /// Idempotent. A directory that is already gone counts as removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory tree could not be deleted; the
    /// workspace stays active so `Drop` retries.
    #[must_use = "cleanup errors should be handled"]
    #[instrument(skip(self), fields(job_id = %self.job_id))]
    pub async fn cleanup(&mut self) -> Result<(), WorkspaceError> {
        if !self.active {
            return Ok(());
        }

        match tokio::fs::remove_dir_all(&self.root).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(source) => {
                warn!(root = %self.root.display(), error = %source, "cleanup failed");
                return Err(WorkspaceError::CleanupFailed {
                    path: self.root.clone(),
                    source,
                });
            }
        }

        self.active = false;
        debug!("workspace removed");
        Ok(())
    }

    /// Attach a concurrency permit to this workspace
    pub(crate) fn with_permit(mut self, permit: OwnedSemaphorePermit) -> Self {
        self._permit = Some(permit);
        self
    }

    /// Check if the directory is still on disk (not yet cleaned up)
    pub fn is_active(&self) -> bool {
        self.active
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        if !self.active {
            return;
        }

        warn!(
            job_id = %self.job_id,
            root = %self.root.display(),
            "Workspace dropped without explicit cleanup, removing synchronously"
        );

        match std::fs::remove_dir_all(&self.root) {
            Ok(()) => debug!(job_id = %self.job_id, "drop cleanup succeeded"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(
                job_id = %self.job_id,
                error = %e,
                "drop cleanup failed, workspace leaked"
            ),
        }
    }
}

/// Hands out workspaces under a shared root, bounding concurrent jobs
#[derive(Debug)]
pub struct WorkspaceManager {
    /// Parent directory of all job directories
    root: PathBuf,

    /// Maximum number of live workspaces
    capacity: u32,

    /// Semaphore to limit concurrent jobs
    semaphore: Arc<Semaphore>,
}

impl WorkspaceManager {
    /// Create a new manager. The root directory is created lazily.
    pub fn new(root: impl Into<PathBuf>, capacity: u32) -> Self {
        let capacity = capacity.max(1);
        Self {
            root: root.into(),
            capacity,
            semaphore: Arc::new(Semaphore::new(capacity as usize)),
        }
    }

    /// Acquire a fresh workspace, waiting while all slots are busy
    #[instrument(skip(self))]
    pub async fn acquire(&self) -> Result<Workspace, WorkspaceError> {
        let permit = self
            .semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| WorkspaceError::Closed)?;

        let workspace = Workspace::create(&self.root).await?;
        debug!(job_id = workspace.job_id(), "acquired workspace");

        Ok(workspace.with_permit(permit))
    }

    /// Get the workspace root
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Get the number of free slots
    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Get the maximum number of concurrent workspaces
    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Stop handing out workspaces; pending and future `acquire` calls fail
    pub fn close(&self) {
        self.semaphore.close();
    }

    /// Remove job directories older than `max_age`
    ///
    /// Only entries named `job-*` are touched, so a root shared with other
    /// files is safe. Returns the number of directories removed.
    #[instrument(skip(self))]
    pub async fn sweep_stale(&self, max_age: Duration) -> Result<usize, WorkspaceError> {
        let mut entries = match tokio::fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };

        let now = SystemTime::now();
        let mut removed = 0;

        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            if !name.to_string_lossy().starts_with(JOB_DIR_PREFIX) {
                continue;
            }

            let metadata = match entry.metadata().await {
                Ok(metadata) if metadata.is_dir() => metadata,
                _ => continue,
            };
            let age = metadata
                .modified()
                .ok()
                .and_then(|modified| now.duration_since(modified).ok())
                .unwrap_or_default();
            if age < max_age {
                continue;
            }

            let path = entry.path();
            match tokio::fs::remove_dir_all(&path).await {
                Ok(()) => {
                    debug!(path = %path.display(), ?age, "removed stale workspace");
                    removed += 1;
                }
                Err(e) => warn!(path = %path.display(), error = %e, "failed to remove stale workspace"),
            }
        }

        Ok(removed)
    }
}
