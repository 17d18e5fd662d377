//! Toolchain version probing

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use tracing::{debug, instrument};

use crate::config::Toolchain;
use crate::toolchain::{ToolchainCommand, ToolchainError, run_with_output};

const PROBE_TIMEOUT: Duration = Duration::from_secs(15);
const PROBE_MAX_OUTPUT: usize = 64 * 1024;

/// A `MAJOR.MINOR.PATCH` version
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ToolchainVersion {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
}

impl ToolchainVersion {
    pub const fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// Find the first version-looking token in toolchain output
    ///
    /// Accepts output like `scarb 2.8.4 (a1b2c3 2024-10-01)` or `v2.4.0-rc.1`.
    pub fn find_in(output: &str) -> Option<Self> {
        output
            .split(|c: char| c.is_whitespace() || matches!(c, '(' | ')' | ',' | ':'))
            .find_map(|token| token.parse().ok())
    }
}

impl FromStr for ToolchainVersion {
    type Err = ToolchainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let unparseable = || ToolchainError::UnparseableVersion(s.to_owned());

        let trimmed = s.trim().trim_start_matches('v');
        // Drop pre-release and build metadata
        let core = trimmed
            .split(['-', '+'])
            .next()
            .ok_or_else(unparseable)?;

        let mut parts = core.split('.');
        let mut next = || -> Result<u64, ToolchainError> {
            let part = parts.next().ok_or_else(unparseable)?;
            if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
                return Err(unparseable());
            }
            part.parse().map_err(|_| unparseable())
        };

        let version = Self::new(next()?, next()?, next()?);
        if parts.next().is_some() {
            return Err(unparseable());
        }
        Ok(version)
    }
}

impl fmt::Display for ToolchainVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// Run the toolchain's version command and parse its output
#[instrument(skip(toolchain), fields(toolchain = %toolchain.name))]
pub async fn probe_version(toolchain: &Toolchain) -> Result<ToolchainVersion, ToolchainError> {
    if toolchain.version_command.is_empty() {
        return Err(ToolchainError::ProbeFailed(format!(
            "toolchain '{}' has no version command",
            toolchain.name
        )));
    }

    let output = run_with_output(
        ToolchainCommand::for_version(toolchain),
        Some(PROBE_TIMEOUT),
        PROBE_MAX_OUTPUT,
    )
    .await?;

    if output.timed_out {
        return Err(ToolchainError::ProbeFailed("version command timed out".to_owned()));
    }
    if !output.is_success() {
        return Err(ToolchainError::ProbeFailed(format!(
            "version command exited with {:?}: {}",
            output.exit_code,
            output.stderr.to_string_lossy().trim()
        )));
    }

    let stdout = output.stdout.to_string_lossy();
    let version = ToolchainVersion::find_in(&stdout)
        .ok_or_else(|| ToolchainError::UnparseableVersion(stdout.trim().to_owned()))?;

    debug!(%version, "probed toolchain version");
    Ok(version)
}

/// Probe the toolchain and enforce its `min_version`
pub async fn check_version(toolchain: &Toolchain) -> Result<ToolchainVersion, ToolchainError> {
    let found = probe_version(toolchain).await?;

    if let Some(ref min) = toolchain.min_version {
        let required: ToolchainVersion = min.parse()?;
        if found < required {
            return Err(ToolchainError::UnsupportedVersion { found, required });
        }
    }

    Ok(found)
}
