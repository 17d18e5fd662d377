//! External build toolchain wrapper
//!
//! This module runs the configured build command as a child process: command
//! building, spawning with a deadline, bounded output capture, and version
//! probing. The toolchain itself is opaque; only its exit status and output
//! streams are interpreted.

use std::path::Path;

use thiserror::Error;

pub use crate::toolchain::command::ToolchainCommand;
pub use crate::toolchain::process::{CapturedStream, ProcessOutput, run_with_output};
pub use crate::toolchain::version::{ToolchainVersion, check_version, probe_version};

mod command;
mod process;
mod version;

/// Errors that occur while running the toolchain
#[derive(Debug, Error)]
pub enum ToolchainError {
    #[error("toolchain command is empty")]
    EmptyCommand,

    #[error("command '{0}' not found in PATH")]
    NotFound(String),

    #[error("failed to spawn toolchain process: {0}")]
    SpawnFailed(#[source] std::io::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("output capture failed: {0}")]
    Capture(String),

    #[error("version probe failed: {0}")]
    ProbeFailed(String),

    #[error("could not parse a version from {0:?}")]
    UnparseableVersion(String),

    #[error("unsupported toolchain version {found}, requires {required} or newer")]
    UnsupportedVersion {
        found: ToolchainVersion,
        required: ToolchainVersion,
    },
}

/// Resolve the program in a command to an absolute path.
///
/// Bare command names (like `scarb`) are looked up in `search_path`, or the
/// host's PATH when it is `None`, so a missing toolchain is reported as
/// [`ToolchainError::NotFound`] instead of a generic spawn failure.
///
/// Commands that already contain a `/` (like `./build.sh` or
/// `/usr/local/bin/scarb`) are left unchanged.
pub fn resolve_command(command: &mut [String], search_path: Option<&str>) -> Result<(), ToolchainError> {
    let first = match command.first_mut() {
        Some(first) => first,
        None => return Err(ToolchainError::EmptyCommand),
    };

    // Already an absolute or relative path
    if first.contains('/') {
        return Ok(());
    }

    let path_var = match search_path {
        Some(path) => path.to_owned(),
        None => std::env::var("PATH").unwrap_or_default(),
    };
    for dir in path_var.split(':').filter(|dir| !dir.is_empty()) {
        let candidate = Path::new(dir).join(&*first);
        if candidate.is_file() {
            *first = candidate.to_string_lossy().into_owned();
            return Ok(());
        }
    }

    Err(ToolchainError::NotFound(first.clone()))
}
