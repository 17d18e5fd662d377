use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::runner::CompileError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompileLimits {
    /// Wall clock time limit in seconds
    #[serde(default)]
    pub wall_time_limit: Option<f64>,

    /// Maximum captured size of each output stream in kilobytes
    #[serde(default)]
    pub max_output: Option<u64>,

    /// Maximum size of the submitted source and manifest in kilobytes
    #[serde(default)]
    pub max_input: Option<u64>,
}

impl CompileLimits {
    /// 1 kilobyte in bytes
    pub const KB: u64 = 1024;

    /// Create new limits with the built-in defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Limits with every field unset, useful as an override base
    pub fn unset() -> Self {
        Self {
            wall_time_limit: None,
            max_output: None,
            max_input: None,
        }
    }

    /// Set the wall clock time limit in seconds
    pub fn with_wall_time_limit(mut self, seconds: f64) -> Self {
        self.wall_time_limit = Some(seconds);
        self
    }

    /// Set the per-stream output cap in kilobytes
    pub fn with_max_output(mut self, kb: u64) -> Self {
        self.max_output = Some(kb);
        self
    }

    /// Set the input size cap in kilobytes
    pub fn with_max_input(mut self, kb: u64) -> Self {
        self.max_input = Some(kb);
        self
    }

    /// Apply overrides from another CompileLimits, preferring values from `overrides`
    pub fn with_overrides(&self, overrides: &CompileLimits) -> CompileLimits {
        CompileLimits {
            wall_time_limit: overrides.wall_time_limit.or(self.wall_time_limit),
            max_output: overrides.max_output.or(self.max_output),
            max_input: overrides.max_input.or(self.max_input),
        }
    }

    /// Wall time limit as a `Duration`, if set and positive
    pub fn wall_time(&self) -> Option<Duration> {
        self.wall_time_limit
            .filter(|secs| *secs > 0.0)
            .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
    }

    /// Output cap in bytes (unbounded when unset)
    pub fn max_output_bytes(&self) -> usize {
        self.max_output
            .map(|kb| kb.saturating_mul(Self::KB))
            .map(|bytes| usize::try_from(bytes).unwrap_or(usize::MAX))
            .unwrap_or(usize::MAX)
    }

    /// Input cap in bytes (unbounded when unset)
    pub fn max_input_bytes(&self) -> usize {
        self.max_input
            .map(|kb| kb.saturating_mul(Self::KB))
            .map(|bytes| usize::try_from(bytes).unwrap_or(usize::MAX))
            .unwrap_or(usize::MAX)
    }
}

impl Default for CompileLimits {
    fn default() -> Self {
        Self {
            wall_time_limit: Some(120.0),
            max_output: Some(1024), // 1 MB per stream
            max_input: Some(512),   // 512 KB
        }
    }
}

/// A single compilation job as submitted by a client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompilationRequest {
    /// Program source, written to the toolchain's source file
    #[serde(rename = "contract")]
    pub source_text: String,

    /// Build manifest, written to the workspace root
    #[serde(rename = "scarbToml")]
    pub manifest_text: String,
}

impl CompilationRequest {
    pub fn new(source_text: impl Into<String>, manifest_text: impl Into<String>) -> Self {
        Self {
            source_text: source_text.into(),
            manifest_text: manifest_text.into(),
        }
    }

    /// Extract a request from an untyped JSON body
    ///
    /// Both fields must be present and be strings.
    pub fn from_json(body: &serde_json::Value) -> Result<Self, CompileError> {
        let field = |name: &str| -> Result<String, CompileError> {
            match body.get(name) {
                Some(serde_json::Value::String(text)) => Ok(text.clone()),
                Some(_) => Err(CompileError::InvalidInput(format!("'{name}' must be a string"))),
                None => Err(CompileError::InvalidInput(format!("missing field '{name}'"))),
            }
        };

        Ok(Self {
            source_text: field("contract")?,
            manifest_text: field("scarbToml")?,
        })
    }
}

/// Outcome of one toolchain invocation
#[derive(Debug, Clone, Default)]
pub struct CompilationResult {
    /// Identifier of the job (also the workspace directory suffix)
    pub job_id: String,

    /// Exit code if the toolchain exited normally
    pub exit_code: Option<i32>,

    /// Signal number if the toolchain was killed by a signal
    pub signal: Option<i32>,

    /// Captured standard output
    pub stdout: String,

    /// Captured standard error
    pub stderr: String,

    /// Whether stdout hit the output cap
    pub stdout_truncated: bool,

    /// Whether stderr hit the output cap
    pub stderr_truncated: bool,

    /// Wall clock time spent in the toolchain
    pub duration: Duration,

    /// Contract names found in the artifact directory after a successful build
    pub artifacts: Vec<String>,

    /// Non-fatal findings about the submitted source
    pub warnings: Vec<String>,
}

impl CompilationResult {
    /// Check if the toolchain exited with code 0
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// Whether either stream was cut short
    pub fn truncated(&self) -> bool {
        self.stdout_truncated || self.stderr_truncated
    }

    /// Combined stdout and stderr transcript
    pub fn transcript(&self) -> String {
        format!("STDOUT:\n{}\n\nSTDERR:\n{}", self.stdout, self.stderr)
    }

    /// Client-facing output: stdout on success, the full transcript otherwise
    pub fn output(&self) -> String {
        if self.is_success() {
            self.stdout.clone()
        } else {
            self.transcript()
        }
    }
}
