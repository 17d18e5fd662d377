use std::collections::HashMap;
use std::path::PathBuf;

use serde::Deserialize;
use thiserror::Error;

pub use crate::config::toolchain::{ArtifactConfig, DEFAULT_MIN_VERSION, FileName, Toolchain};
use crate::types::CompileLimits;

mod loader;
pub mod toolchain;

/// Example configuration embedded at compile time.
///
/// Library users can access this to generate a starter config file.
pub const EXAMPLE_CONFIG: &str = include_str!("../../cairobox.example.toml");

/// Prefix for environment variable overrides (e.g. `CAIROBOX_SERVER__PORT`)
pub const ENV_PREFIX: &str = "CAIROBOX";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid file name: {0:?}")]
    InvalidFileName(String),

    #[error("failed to parse config: {0}")]
    Parse(#[from] config::ConfigError),

    #[error("toolchain '{0}' not found in configuration")]
    ToolchainNotFound(String),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Config for cairobox
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Directory under which per-job workspaces are created.
    #[serde(default = "default_workspace_root")]
    pub workspace_root: PathBuf,

    /// Maximum number of compilation jobs running at once.
    #[serde(default = "default_max_concurrent_jobs")]
    pub max_concurrent_jobs: u32,

    /// Remove leftover job workspaces older than this many seconds at server start.
    #[serde(default)]
    pub stale_workspace_age: Option<u64>,

    /// Default limits applied to every job.
    /// Toolchain limits and per-call limits take precedence, in that order.
    #[serde(default)]
    pub default_limits: CompileLimits,

    /// Toolchain used when a caller does not pick one
    #[serde(default = "default_toolchain_id")]
    pub default_toolchain: String,

    /// Toolchain configurations keyed by toolchain ID
    #[serde(default)]
    pub toolchains: HashMap<String, Toolchain>,

    /// HTTP listener settings
    #[serde(default)]
    pub server: ServerConfig,
}

/// HTTP listener settings
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Maximum request body size in bytes
    #[serde(default = "default_body_limit")]
    pub body_limit: usize,
}

impl ServerConfig {
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            body_limit: default_body_limit(),
        }
    }
}

impl Config {
    /// Create a new config with the embedded default toolchains
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty config with no toolchains
    pub fn empty() -> Self {
        Self {
            workspace_root: default_workspace_root(),
            max_concurrent_jobs: default_max_concurrent_jobs(),
            stale_workspace_age: None,
            default_limits: CompileLimits::default(),
            default_toolchain: default_toolchain_id(),
            toolchains: HashMap::new(),
            server: ServerConfig::default(),
        }
    }

    /// Create a config with a single toolchain registered as the default
    pub fn with_toolchain(id: impl Into<String>, toolchain: Toolchain) -> Self {
        let id = id.into();
        let mut config = Self::empty();
        config.toolchains.insert(id.clone(), toolchain);
        config.default_toolchain = id;
        config
    }

    /// Get a toolchain by ID
    pub fn get_toolchain(&self, id: &str) -> Result<&Toolchain, ConfigError> {
        self.toolchains
            .get(id)
            .ok_or_else(|| ConfigError::ToolchainNotFound(id.to_string()))
    }

    /// Get the default toolchain
    pub fn toolchain(&self) -> Result<&Toolchain, ConfigError> {
        self.get_toolchain(&self.default_toolchain)
    }

    /// Merge limits: config defaults → toolchain → caller overrides
    pub fn effective_limits(
        &self,
        toolchain: &Toolchain,
        overrides: Option<&CompileLimits>,
    ) -> CompileLimits {
        let mut limits = self.default_limits.clone();
        if let Some(ref toolchain_limits) = toolchain.limits {
            limits = limits.with_overrides(toolchain_limits);
        }
        if let Some(overrides) = overrides {
            limits = limits.with_overrides(overrides);
        }
        limits
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::parse_toml(EXAMPLE_CONFIG).expect("embedded default config should be valid")
    }
}

fn default_workspace_root() -> PathBuf {
    std::env::temp_dir().join("cairobox")
}

fn default_max_concurrent_jobs() -> u32 {
    4
}

fn default_toolchain_id() -> String {
    "scarb".to_owned()
}

fn default_host() -> String {
    "0.0.0.0".to_owned()
}

fn default_port() -> u16 {
    8080
}

fn default_body_limit() -> usize {
    2 * 1024 * 1024
}
