//! Compilation job pipeline
//!
//! Validates a request, materializes it into a fresh workspace, runs the
//! toolchain there and removes the workspace before reporting the outcome.

use tracing::{debug, instrument, warn};

use crate::config::{Config, Toolchain};
use crate::runner::CompileError;
use crate::runner::artifacts::list_artifacts;
use crate::runner::diagnostics::lint_source;
use crate::toolchain::{ProcessOutput, ToolchainCommand, run_with_output};
use crate::types::{CompilationRequest, CompilationResult, CompileLimits};
use crate::workspace::{Workspace, WorkspaceManager};

/// Run one compilation job
///
/// The job's workspace is gone by the time this returns, whichever way it
/// returns. A failure to remove it is logged and does not change the result.
#[instrument(skip_all, fields(toolchain = %toolchain.name))]
pub async fn compile(
    workspaces: &WorkspaceManager,
    config: &Config,
    toolchain: &Toolchain,
    request: &CompilationRequest,
    limits: Option<&CompileLimits>,
) -> Result<CompilationResult, CompileError> {
    let limits = config.effective_limits(toolchain, limits);
    check_input(request, &limits)?;

    let warnings = if toolchain.lint {
        lint_source(&request.source_text)
    } else {
        Vec::new()
    };

    let mut workspace = workspaces.acquire().await?;
    let job_id = workspace.job_id().to_owned();
    debug!(job_id, root = %workspace.root().display(), "starting job");

    let outcome = run_job(&workspace, toolchain, request, &limits).await;

    if let Err(e) = workspace.cleanup().await {
        warn!(job_id, error = %e, "failed to clean up workspace");
    }

    let (output, artifacts) = outcome?;

    debug!(
        job_id,
        exit_code = ?output.exit_code,
        signal = ?output.signal,
        timed_out = output.timed_out,
        duration_ms = output.elapsed.as_millis() as u64,
        "job finished"
    );

    if output.timed_out {
        return Err(CompileError::Timeout(
            limits.wall_time().unwrap_or(output.elapsed),
        ));
    }

    let result = CompilationResult {
        job_id,
        exit_code: output.exit_code,
        signal: output.signal,
        stdout: output.stdout.to_string_lossy(),
        stderr: output.stderr.to_string_lossy(),
        stdout_truncated: output.stdout.truncated,
        stderr_truncated: output.stderr.truncated,
        duration: output.elapsed,
        artifacts,
        warnings,
    };

    if result.is_success() {
        Ok(result)
    } else {
        Err(CompileError::BuildFailed(Box::new(result)))
    }
}

/// Reject requests before touching the filesystem
fn check_input(request: &CompilationRequest, limits: &CompileLimits) -> Result<(), CompileError> {
    let max = limits.max_input_bytes();
    for (field, text) in [
        ("contract", &request.source_text),
        ("scarbToml", &request.manifest_text),
    ] {
        if text.len() > max {
            return Err(CompileError::InvalidInput(format!(
                "'{field}' is {} bytes, limit is {max}",
                text.len()
            )));
        }
    }
    Ok(())
}

/// Write the project, build it and collect artifacts
async fn run_job(
    workspace: &Workspace,
    toolchain: &Toolchain,
    request: &CompilationRequest,
    limits: &CompileLimits,
) -> Result<(ProcessOutput, Vec<String>), CompileError> {
    workspace
        .write_file(toolchain.manifest_name.as_str(), request.manifest_text.as_bytes())
        .await?;
    workspace
        .write_file(toolchain.source_path(), request.source_text.as_bytes())
        .await?;
    debug!("wrote project files");

    let command = ToolchainCommand::for_build(toolchain).working_dir(workspace.root());
    let output = run_with_output(command, limits.wall_time(), limits.max_output_bytes()).await?;

    let artifacts = if output.is_success() {
        list_artifacts(workspace.root(), &toolchain.artifacts)
            .await
            .unwrap_or_else(|e| {
                warn!(error = %e, "failed to list build artifacts");
                Vec::new()
            })
    } else {
        Vec::new()
    };

    Ok((output, artifacts))
}
