use std::fs;

use cairobox::{CompilationRequest, CompileError, Config, Runner};

use super::job_dirs;

const FIXTURES_PATH: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures");

/// Helper to get fixture file content
fn fixture(name: &str) -> String {
    let path = format!("{FIXTURES_PATH}/{name}");
    fs::read_to_string(&path).unwrap_or_else(|e| panic!("Failed to read fixture {path}: {e}"))
}

fn scarb_runner(root: &std::path::Path) -> Runner {
    let mut config = Config::default();
    config.workspace_root = root.to_path_buf();
    Runner::new(config)
}

#[tokio::test]
#[ignore = "requires scarb"]
async fn test_scarb_version_supported() {
    let tmp = tempfile::tempdir().unwrap();
    let version = scarb_runner(tmp.path())
        .check_toolchain(None)
        .await
        .expect("scarb should be installed and recent enough");
    assert!(version.major >= 2);
}

#[tokio::test]
#[ignore = "requires scarb"]
async fn test_scarb_compiles_contract() {
    let tmp = tempfile::tempdir().unwrap();
    let runner = scarb_runner(tmp.path());

    let request = CompilationRequest::new(
        fixture("hello_starknet/main.cairo"),
        fixture("hello_starknet/Scarb.toml"),
    );
    let result = runner
        .compile(&request)
        .await
        .expect("Contract should compile");

    assert!(result.is_success());
    assert!(result.stdout.contains("Finished"));
    assert_eq!(result.artifacts, vec!["hello_starknet_Counter"]);
    assert!(result.warnings.is_empty());
    assert!(job_dirs(tmp.path()).is_empty());
}

#[tokio::test]
#[ignore = "requires scarb"]
async fn test_scarb_reports_errors() {
    let tmp = tempfile::tempdir().unwrap();
    let runner = scarb_runner(tmp.path());

    let request = CompilationRequest::new(
        fixture("hello_starknet/broken.cairo"),
        fixture("hello_starknet/Scarb.toml"),
    );
    match runner.compile(&request).await {
        Err(CompileError::BuildFailed(result)) => {
            assert!(result.transcript().contains("error"));
            assert!(result.artifacts.is_empty());
        }
        other => panic!("expected BuildFailed, got {other:?}"),
    }
    assert!(job_dirs(tmp.path()).is_empty());
}
