use cairobox::{CompilationRequest, CompileError, CompileLimits, ErrorKind, Toolchain};

use super::{MANIFEST, job_dirs, request, runner_with, sh_toolchain};

#[tokio::test]
async fn test_success_output_is_stdout() {
    let tmp = tempfile::tempdir().unwrap();
    let runner = runner_with(
        sh_toolchain("printf 'Compiling x... Finished'; printf 'note' >&2"),
        tmp.path(),
    );

    let result = runner
        .compile(&CompilationRequest::new(
            "fn main() {}",
            "[package]\nname=\"x\"",
        ))
        .await
        .expect("Compilation should succeed");

    assert!(result.is_success());
    assert_eq!(result.output(), "Compiling x... Finished");
    assert_eq!(result.stdout, "Compiling x... Finished");
    assert_eq!(result.stderr, "note");
    assert_eq!(result.exit_code, Some(0));
    assert!(!result.job_id.is_empty());

    // Workspace is gone
    assert!(job_dirs(tmp.path()).is_empty());
}

#[tokio::test]
async fn test_files_written_to_layout() {
    let tmp = tempfile::tempdir().unwrap();
    let runner = runner_with(
        sh_toolchain("cat Scarb.toml; echo ---; cat src/main.cairo"),
        tmp.path(),
    );

    let result = runner
        .compile(&request("fn main() {}"))
        .await
        .expect("Compilation should succeed");

    assert_eq!(result.stdout, format!("{MANIFEST}---\nfn main() {{}}"));
    assert!(job_dirs(tmp.path()).is_empty());
}

#[tokio::test]
async fn test_custom_source_layout() {
    let tmp = tempfile::tempdir().unwrap();
    let mut toolchain = sh_toolchain("cat {source}");
    toolchain.source_name = cairobox::config::FileName::new("lib.cairo").unwrap();

    let runner = runner_with(toolchain, tmp.path());
    let result = runner
        .compile(&request("mod counter;"))
        .await
        .expect("Compilation should succeed");

    assert_eq!(result.stdout, "mod counter;");
}

#[tokio::test]
async fn test_build_failure_carries_both_streams() {
    let tmp = tempfile::tempdir().unwrap();
    let runner = runner_with(
        sh_toolchain("echo 'Compiling x'; echo 'error: Identifier not found in module' >&2; exit 1"),
        tmp.path(),
    );

    let err = runner
        .compile(&request("fn main() { foo(); }"))
        .await
        .expect_err("Compilation should fail");

    assert_eq!(err.kind(), ErrorKind::BuildFailed);
    assert_eq!(err.hint(), Some("Undefined symbol reference"));
    match err {
        CompileError::BuildFailed(result) => {
            assert_eq!(result.exit_code, Some(1));
            let transcript = result.transcript();
            assert!(transcript.contains("Compiling x"));
            assert!(transcript.contains("not found in module"));
            assert_eq!(result.output(), transcript);
        }
        other => panic!("expected BuildFailed, got {other:?}"),
    }

    assert!(job_dirs(tmp.path()).is_empty());
}

#[tokio::test]
async fn test_killed_toolchain_is_build_failure() {
    let tmp = tempfile::tempdir().unwrap();
    let runner = runner_with(sh_toolchain("kill -9 $$"), tmp.path());

    match runner.compile(&request("fn main() {}")).await {
        Err(CompileError::BuildFailed(result)) => {
            assert_eq!(result.exit_code, None);
            assert_eq!(result.signal, Some(9));
        }
        other => panic!("expected BuildFailed, got {other:?}"),
    }
    assert!(job_dirs(tmp.path()).is_empty());
}

#[tokio::test]
async fn test_invalid_input_touches_nothing() {
    let tmp = tempfile::tempdir().unwrap();
    let root = tmp.path().join("jobs");
    let marker = tmp.path().join("ran");
    let runner = runner_with(
        sh_toolchain(&format!("touch {}", marker.display())),
        &root,
    );

    let err = runner
        .compile_value(&serde_json::json!({ "contract": 1, "scarbToml": MANIFEST }))
        .await
        .expect_err("Non-string source should be rejected");
    assert_eq!(err.kind(), ErrorKind::InvalidInput);

    assert!(!root.exists());
    assert!(!marker.exists());
}

#[tokio::test]
async fn test_empty_source_reaches_toolchain() {
    let tmp = tempfile::tempdir().unwrap();
    let runner = runner_with(sh_toolchain("echo ok; wc -c < src/main.cairo"), tmp.path());

    let result = runner
        .compile(&CompilationRequest::new("", MANIFEST))
        .await
        .expect("Empty source is still a string");

    assert!(result.is_success());
    assert_eq!(result.stdout.split_whitespace().collect::<Vec<_>>(), ["ok", "0"]);
    assert!(job_dirs(tmp.path()).is_empty());
}

#[tokio::test]
async fn test_oversized_input_rejected() {
    let tmp = tempfile::tempdir().unwrap();
    let mut toolchain = sh_toolchain("true");
    toolchain.limits = Some(CompileLimits::unset().with_max_input(1));
    let runner = runner_with(toolchain, &tmp.path().join("jobs"));

    let err = runner
        .compile(&request(&"x".repeat(2048)))
        .await
        .expect_err("Oversized source should be rejected");
    assert_eq!(err.kind(), ErrorKind::InvalidInput);
    assert!(!tmp.path().join("jobs").exists());
}

#[tokio::test]
async fn test_missing_toolchain_is_internal() {
    let tmp = tempfile::tempdir().unwrap();
    let runner = runner_with(
        Toolchain::new("Missing", ["cairobox-missing-toolchain", "build"]),
        tmp.path(),
    );

    let err = runner
        .compile(&request("fn main() {}"))
        .await
        .expect_err("Missing toolchain should fail");
    assert_eq!(err.kind(), ErrorKind::InternalError);
    assert!(job_dirs(tmp.path()).is_empty());
}

#[tokio::test]
async fn test_unusable_root_is_workspace_error() {
    let tmp = tempfile::tempdir().unwrap();
    let root = tmp.path().join("not-a-dir");
    std::fs::write(&root, b"file").unwrap();
    let runner = runner_with(sh_toolchain("true"), &root);

    let err = runner
        .compile(&request("fn main() {}"))
        .await
        .expect_err("Workspace creation should fail");
    assert_eq!(err.kind(), ErrorKind::WorkspaceError);
}

#[tokio::test]
async fn test_output_is_capped() {
    let tmp = tempfile::tempdir().unwrap();
    let mut toolchain = sh_toolchain("head -c 10000 /dev/zero | tr '\\0' a; echo done >&2");
    toolchain.limits = Some(CompileLimits::unset().with_max_output(1));
    let runner = runner_with(toolchain, tmp.path());

    let result = runner
        .compile(&request("fn main() {}"))
        .await
        .expect("Compilation should succeed");

    assert_eq!(result.stdout.len(), 1024);
    assert!(result.stdout_truncated);
    assert!(!result.stderr_truncated);
    assert!(result.truncated());
    assert_eq!(result.stderr, "done\n");
}

#[tokio::test]
async fn test_artifacts_listed_before_cleanup() {
    let tmp = tempfile::tempdir().unwrap();
    let runner = runner_with(
        sh_toolchain(
            "mkdir -p target/dev && \
             touch target/dev/x_Counter.contract_class.json \
                   target/dev/x_Counter.compiled_contract_class.json && \
             echo Finished",
        ),
        tmp.path(),
    );

    let result = runner
        .compile(&request("fn main() {}"))
        .await
        .expect("Compilation should succeed");

    assert_eq!(result.artifacts, vec!["x_Counter"]);
    assert!(job_dirs(tmp.path()).is_empty());
}

#[tokio::test]
async fn test_lint_warnings_do_not_block() {
    let tmp = tempfile::tempdir().unwrap();
    let mut toolchain = sh_toolchain("echo ok");
    toolchain.lint = true;
    let runner = runner_with(toolchain, tmp.path());

    let result = runner
        .compile(&request("fn main() {}"))
        .await
        .expect("Compilation should succeed");

    assert!(result.is_success());
    assert_eq!(result.warnings.len(), 2);
}

#[tokio::test]
async fn test_toolchain_env_and_caller_limits() {
    let tmp = tempfile::tempdir().unwrap();
    let mut toolchain = sh_toolchain("printf \"$SCARB_PROFILE\"");
    toolchain
        .env
        .insert("SCARB_PROFILE".to_owned(), "release".to_owned());
    let runner = runner_with(toolchain, tmp.path());

    let limits = CompileLimits::unset().with_wall_time_limit(30.0);
    let result = runner
        .compile_with(&request("fn main() {}"), Some("fake"), Some(&limits))
        .await
        .expect("Compilation should succeed");

    assert_eq!(result.stdout, "release");
}
