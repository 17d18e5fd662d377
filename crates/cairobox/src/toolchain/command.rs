//! Command builder for toolchain invocations
//!
//! Collects program, arguments, environment and working directory, and turns
//! them into a `tokio::process::Command` wired for output capture.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::process::Command;

use crate::config::Toolchain;
use crate::toolchain::{ToolchainError, resolve_command};

/// Builder for a toolchain child process
#[derive(Debug, Clone, Default)]
pub struct ToolchainCommand {
    /// Program followed by its arguments
    command: Vec<String>,
    /// Extra environment variables
    env: BTreeMap<String, String>,
    /// PATH override, also used to resolve the program
    path: Option<String>,
    working_dir: Option<PathBuf>,
}

impl ToolchainCommand {
    /// Create a new builder running `command`
    pub fn new(command: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            command: command.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    /// Builder for a toolchain's build step, with its env and PATH applied
    pub fn for_build(toolchain: &Toolchain) -> Self {
        Self::new(toolchain.build_command())
            .envs(toolchain.env.iter())
            .path(toolchain.path.clone())
    }

    /// Builder for a toolchain's version probe
    pub fn for_version(toolchain: &Toolchain) -> Self {
        Self::new(toolchain.version_command.iter().cloned())
            .envs(toolchain.env.iter())
            .path(toolchain.path.clone())
    }

    /// Set an environment variable
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Set several environment variables
    pub fn envs<K, V>(mut self, vars: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.env
            .extend(vars.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Override PATH for the child (and for resolving the program)
    pub fn path(mut self, path: Option<String>) -> Self {
        self.path = path;
        self
    }

    /// Set the working directory
    pub fn working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// The command line as it will be executed (before PATH resolution)
    pub fn args(&self) -> &[String] {
        &self.command
    }

    /// Working directory, if set
    pub fn dir(&self) -> Option<&Path> {
        self.working_dir.as_deref()
    }

    /// Build the process command
    ///
    /// Resolves the program, pipes stdout and stderr, closes stdin, places
    /// the child in its own process group and kills it if the handle is
    /// dropped.
    pub fn build(self) -> Result<Command, ToolchainError> {
        let mut argv = self.command;
        resolve_command(&mut argv, self.path.as_deref())?;

        let (program, args) = argv.split_first().ok_or(ToolchainError::EmptyCommand)?;
        let mut command = Command::new(program);
        command
            .args(args)
            .envs(&self.env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        if let Some(path) = self.path {
            command.env("PATH", path);
        }
        if let Some(dir) = self.working_dir {
            command.current_dir(dir);
        }

        #[cfg(unix)]
        command.process_group(0);

        Ok(command)
    }
}
