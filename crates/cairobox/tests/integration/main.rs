//! Integration tests for cairobox
//!
//! Most tests drive the runner with fake toolchains written as `sh -c`
//! scripts, so they only need a unix shell.
//!
//! Tests against a real `scarb` binary are behind the `integration-tests`
//! feature and marked `#[ignore]`. To include them:
//!   cargo test -p cairobox --features integration-tests -- --include-ignored

#![cfg(unix)]

use std::fs;
use std::path::{Path, PathBuf};

use cairobox::{CompilationRequest, Config, Runner, Toolchain};

mod job_lifecycle;
#[cfg(feature = "integration-tests")]
mod scarb;
mod timeouts;

pub(crate) const MANIFEST: &str = "[package]\nname=\"x\"\n";

/// Toolchain that runs `script` with `sh -c` in the workspace
pub(crate) fn sh_toolchain(script: &str) -> Toolchain {
    Toolchain::new("Fake", ["sh", "-c", script])
}

/// Runner using `toolchain` as its default, with workspaces under `root`
pub(crate) fn runner_with(toolchain: Toolchain, root: &Path) -> Runner {
    let mut config = Config::with_toolchain("fake", toolchain);
    config.workspace_root = root.to_path_buf();
    Runner::new(config)
}

pub(crate) fn request(source: &str) -> CompilationRequest {
    CompilationRequest::new(source, MANIFEST)
}

/// Entries currently under a workspace root
pub(crate) fn job_dirs(root: &Path) -> Vec<PathBuf> {
    match fs::read_dir(root) {
        Ok(entries) => entries.map(|e| e.unwrap().path()).collect(),
        Err(_) => Vec::new(),
    }
}

/// Whether a process is still running, per procfs (zombies count as gone)
pub(crate) fn process_alive(pid: u32) -> bool {
    match fs::read_to_string(format!("/proc/{pid}/stat")) {
        // State is the first field after the parenthesised command name
        Ok(stat) => stat
            .rsplit(')')
            .next()
            .and_then(|rest| rest.split_whitespace().next())
            .is_some_and(|state| state != "Z"),
        Err(_) => false,
    }
}

/// Poll until `pid` is gone, for up to five seconds
pub(crate) async fn wait_for_exit(pid: u32) -> bool {
    for _ in 0..50 {
        if !process_alive(pid) {
            return true;
        }
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    }
    false
}

/// Read a pid written by a fake toolchain
pub(crate) fn read_pid(path: &Path) -> u32 {
    fs::read_to_string(path)
        .unwrap_or_else(|e| panic!("Failed to read pid file {}: {e}", path.display()))
        .trim()
        .parse()
        .expect("pid file should contain a number")
}
