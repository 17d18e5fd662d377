use std::collections::HashMap;
use std::path::PathBuf;

use serde::{Deserialize, Deserializer, Serialize, de};

use crate::config::ConfigError;
use crate::types::CompileLimits;

const INVALID_FILE_NAME_CHARS: [char; 2] = ['/', '\\'];

/// Configuration for an external build toolchain
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Toolchain {
    /// Human-readable name for the toolchain (e.g., "Scarb")
    pub name: String,

    /// Build command and arguments with placeholders
    /// Placeholders: {manifest}, {source}
    pub command: Vec<String>,

    /// Manifest file name at the workspace root (e.g., "Scarb.toml")
    #[serde(default = "default_manifest_name")]
    pub manifest_name: FileName,

    /// Directory for the source file, relative to the workspace root
    #[serde(default = "default_source_dir")]
    pub source_dir: String,

    /// Source file name inside `source_dir` (e.g., "main.cairo")
    #[serde(default = "default_source_name")]
    pub source_name: FileName,

    /// Environment variables to set for the build
    #[serde(default)]
    pub env: HashMap<String, String>,

    /// PATH for the build process. Inherited from the host if not specified.
    #[serde(default)]
    pub path: Option<String>,

    /// Limits for the build (overrides defaults)
    #[serde(default)]
    pub limits: Option<CompileLimits>,

    /// Command printing the toolchain version. Empty disables the check.
    #[serde(default = "default_version_command")]
    pub version_command: Vec<String>,

    /// Oldest supported toolchain version, [`DEFAULT_MIN_VERSION`] if unset
    #[serde(default = "default_min_version")]
    pub min_version: Option<String>,

    /// Where build artifacts land
    #[serde(default)]
    pub artifacts: ArtifactConfig,

    /// Check the source for common contract mistakes before building
    #[serde(default)]
    pub lint: bool,
}

impl Toolchain {
    /// Create a toolchain with the given command and default file layout
    pub fn new(name: impl Into<String>, command: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            name: name.into(),
            command: command.into_iter().map(Into::into).collect(),
            manifest_name: default_manifest_name(),
            source_dir: default_source_dir(),
            source_name: default_source_name(),
            env: HashMap::new(),
            path: None,
            limits: None,
            version_command: Vec::new(),
            min_version: None,
            artifacts: ArtifactConfig::default(),
            lint: false,
        }
    }

    /// Path of the source file relative to the workspace root
    pub fn source_path(&self) -> PathBuf {
        let dir = self.source_dir.trim_matches('/');
        if dir.is_empty() {
            PathBuf::from(self.source_name.as_str())
        } else {
            PathBuf::from(dir).join(self.source_name.as_str())
        }
    }

    /// Build command with placeholders expanded
    pub fn build_command(&self) -> Vec<String> {
        let source = self.source_path();
        Self::expand_command(
            &self.command,
            self.manifest_name.as_str(),
            &source.to_string_lossy(),
        )
    }

    /// Expand placeholders in the given command
    pub fn expand_command(command: &[String], manifest: &str, source: &str) -> Vec<String> {
        command
            .iter()
            .map(|arg| {
                arg.replace("{manifest}", manifest)
                    .replace("{source}", source)
            })
            .collect()
    }
}

/// Single path component (no separators, not `.` or `..`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileName(String);

impl FileName {
    pub fn new(name: &str) -> Result<Self, ConfigError> {
        if name.is_empty() || name == "." || name == ".." {
            return Err(ConfigError::InvalidFileName(name.to_owned()));
        }
        let contains_invalid = name.chars().any(|c| INVALID_FILE_NAME_CHARS.contains(&c));
        if contains_invalid {
            return Err(ConfigError::InvalidFileName(name.to_owned()));
        }
        Ok(Self(name.to_owned()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl<'de> Deserialize<'de> for FileName {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        FileName::new(&s).map_err(|_| {
            de::Error::invalid_value(
                de::Unexpected::Str(&s),
                &"a non-empty file name without path separators",
            )
        })
    }
}

impl std::fmt::Display for FileName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Location and naming of build artifacts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactConfig {
    /// Artifact directory relative to the workspace root
    #[serde(default = "default_artifact_dir")]
    pub dir: String,

    /// File name suffixes that mark a compiled contract
    #[serde(default = "default_artifact_suffixes")]
    pub suffixes: Vec<String>,
}

impl Default for ArtifactConfig {
    fn default() -> Self {
        Self {
            dir: default_artifact_dir(),
            suffixes: default_artifact_suffixes(),
        }
    }
}

/// Default minimum Scarb version
pub const DEFAULT_MIN_VERSION: &str = "2.4.0";

fn default_min_version() -> Option<String> {
    Some(DEFAULT_MIN_VERSION.to_owned())
}

fn default_manifest_name() -> FileName {
    FileName("Scarb.toml".to_owned())
}

fn default_source_dir() -> String {
    "src".to_owned()
}

fn default_source_name() -> FileName {
    FileName("main.cairo".to_owned())
}

fn default_version_command() -> Vec<String> {
    vec!["scarb".to_owned(), "--version".to_owned()]
}

fn default_artifact_dir() -> String {
    "target/dev".to_owned()
}

fn default_artifact_suffixes() -> Vec<String> {
    vec![
        ".contract_class.json".to_owned(),
        ".compiled_contract_class.json".to_owned(),
    ]
}
