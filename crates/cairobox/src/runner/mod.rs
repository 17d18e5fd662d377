//! Compilation job runner
//!
//! Provides the high-level API for turning a source/manifest pair into a
//! build result.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

pub use crate::runner::artifacts::list_artifacts;
pub use crate::runner::compile::compile;
pub use crate::runner::diagnostics::{classify_failure, lint_source};

mod artifacts;
mod compile;
mod diagnostics;

use crate::{
    config::{Config, ConfigError},
    toolchain::{ToolchainError, ToolchainVersion, check_version},
    types::{CompilationRequest, CompilationResult, CompileLimits},
    workspace::{WorkspaceError, WorkspaceManager},
};

/// Broad failure category, used by callers to pick a response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidInput,
    WorkspaceError,
    BuildFailed,
    InternalError,
    Timeout,
}

/// Errors that occur during a compilation job
#[derive(Debug, Error)]
pub enum CompileError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("workspace error: {0}")]
    Workspace(#[from] WorkspaceError),

    /// The toolchain ran and reported failure; carries the full result
    #[error("build failed with exit code {:?}", .0.exit_code)]
    BuildFailed(Box<CompilationResult>),

    #[error("build timed out after {0:?}")]
    Timeout(Duration),

    #[error("toolchain error: {0}")]
    Toolchain(#[from] ToolchainError),

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl CompileError {
    /// Failure category of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            CompileError::InvalidInput(_) => ErrorKind::InvalidInput,
            CompileError::Workspace(_) => ErrorKind::WorkspaceError,
            CompileError::BuildFailed(_) => ErrorKind::BuildFailed,
            CompileError::Timeout(_) => ErrorKind::Timeout,
            CompileError::Toolchain(_) | CompileError::Config(_) => ErrorKind::InternalError,
        }
    }

    /// Short description of a build failure, when the transcript matches a known pattern
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            CompileError::BuildFailed(result) => classify_failure(&result.transcript()),
            _ => None,
        }
    }
}

/// High-level runner for compilation jobs
#[derive(Debug, Clone)]
pub struct Runner {
    config: Arc<Config>,
    workspaces: Arc<WorkspaceManager>,
}

impl Runner {
    /// Create a new runner with the given configuration
    pub fn new(config: Config) -> Self {
        let workspaces = WorkspaceManager::new(&config.workspace_root, config.max_concurrent_jobs);
        Self {
            config: Arc::new(config),
            workspaces: Arc::new(workspaces),
        }
    }

    /// Create a new runner with default configuration
    pub fn with_defaults() -> Self {
        Self::new(Config::default())
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Get the workspace manager
    pub fn workspaces(&self) -> &WorkspaceManager {
        &self.workspaces
    }

    /// Compile with the default toolchain and limits
    pub async fn compile(
        &self,
        request: &CompilationRequest,
    ) -> Result<CompilationResult, CompileError> {
        self.compile_with(request, None, None).await
    }

    /// Compile with a specific toolchain and/or limit overrides
    pub async fn compile_with(
        &self,
        request: &CompilationRequest,
        toolchain_id: Option<&str>,
        limits: Option<&CompileLimits>,
    ) -> Result<CompilationResult, CompileError> {
        let toolchain = match toolchain_id {
            Some(id) => self.config.get_toolchain(id)?,
            None => self.config.toolchain()?,
        };
        compile::compile(&self.workspaces, &self.config, toolchain, request, limits).await
    }

    /// Validate an untyped request body and compile it
    pub async fn compile_value(
        &self,
        body: &serde_json::Value,
    ) -> Result<CompilationResult, CompileError> {
        let request = CompilationRequest::from_json(body)?;
        self.compile(&request).await
    }

    /// Check that a toolchain is installed and recent enough
    pub async fn check_toolchain(
        &self,
        toolchain_id: Option<&str>,
    ) -> Result<ToolchainVersion, CompileError> {
        let toolchain = match toolchain_id {
            Some(id) => self.config.get_toolchain(id)?,
            None => self.config.toolchain()?,
        };
        Ok(check_version(toolchain).await?)
    }

    /// Remove workspaces left behind by a previous process
    ///
    /// Does nothing unless `stale_workspace_age` is configured.
    pub async fn sweep_stale(&self) -> Result<usize, WorkspaceError> {
        match self.config.stale_workspace_age {
            Some(secs) => {
                self.workspaces
                    .sweep_stale(Duration::from_secs(secs))
                    .await
            }
            None => Ok(0),
        }
    }
}
