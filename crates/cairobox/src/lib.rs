//! A library for compiling untrusted Cairo projects.
//!
//! Cairobox takes a contract source and its `Scarb.toml`, writes them into a
//! throwaway per-job workspace, runs the build toolchain there with a
//! deadline, and removes the workspace again whatever the outcome.
//!
//! # Features
//!
//! - **Per-job workspaces**: every job gets its own directory, removed on success, failure, timeout or cancellation.
//! - **Bounded builds**: wall-clock deadline with process-group kill, and capped output capture.
//! - **TOML configuration**: toolchain command, file layout, limits and artifact discovery.
//! - **HTTP adapter**: `POST /api/compile` on top of [`Runner`].

pub use config::{Config, ConfigError, EXAMPLE_CONFIG, Toolchain};
pub use runner::{CompileError, ErrorKind, Runner};
pub use toolchain::{ToolchainError, ToolchainVersion};
pub use types::{CompilationRequest, CompilationResult, CompileLimits};
pub use workspace::{Workspace, WorkspaceError, WorkspaceManager};

pub mod config;
pub mod http;
pub mod runner;
pub mod toolchain;
pub mod types;
pub mod workspace;
