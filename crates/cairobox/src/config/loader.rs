//! Configuration file loading for cairobox
//!
//! Handles loading and parsing configuration files using the config crate.

use std::path::{Component, Path};

use config::{Config as ConfigBuilder, Environment, File, FileFormat};

use crate::config::{Config, ConfigError, ENV_PREFIX};

impl Config {
    /// Load configuration from a file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let config = ConfigBuilder::builder()
            .add_source(File::from(path))
            .build()?;

        let config: Config = config.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a TOML string
    pub fn parse_toml(content: &str) -> Result<Self, ConfigError> {
        let config = ConfigBuilder::builder()
            .add_source(File::from_str(content, FileFormat::Toml))
            .build()?;

        let config: Config = config.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Load the layered configuration used by the service
    ///
    /// Layers, later ones winning: the embedded example config, the file at
    /// `path` (if any), then `CAIROBOX_*` environment variables with `__` as
    /// the nesting separator.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = ConfigBuilder::builder()
            .add_source(File::from_str(super::EXAMPLE_CONFIG, FileFormat::Toml));

        if let Some(path) = path {
            builder = builder.add_source(File::from(path));
        }

        let config = builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: Config = config.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        if self.max_concurrent_jobs == 0 {
            return Err(ConfigError::Invalid(
                "max_concurrent_jobs must be at least 1".to_string(),
            ));
        }

        if self.server.body_limit == 0 {
            return Err(ConfigError::Invalid(
                "server.body_limit must be positive".to_string(),
            ));
        }

        if !self.toolchains.is_empty() && !self.toolchains.contains_key(&self.default_toolchain) {
            return Err(ConfigError::Invalid(format!(
                "default toolchain '{}' is not configured",
                self.default_toolchain
            )));
        }

        for (id, toolchain) in &self.toolchains {
            if toolchain.name.is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "toolchain '{id}' has empty name"
                )));
            }
            if toolchain.command.is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "toolchain '{id}' has empty command"
                )));
            }
            if !is_contained(&toolchain.source_dir) {
                return Err(ConfigError::Invalid(format!(
                    "toolchain '{id}' source_dir must stay inside the workspace"
                )));
            }
            if !is_contained(&toolchain.artifacts.dir) {
                return Err(ConfigError::Invalid(format!(
                    "toolchain '{id}' artifacts.dir must stay inside the workspace"
                )));
            }
        }

        Ok(())
    }
}

/// Whether a relative path stays below the directory it is joined to
fn is_contained(path: &str) -> bool {
    Path::new(path)
        .components()
        .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}
