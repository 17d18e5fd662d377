use std::time::{Duration, Instant};

use cairobox::{CompileError, CompileLimits, ErrorKind};

use super::{job_dirs, read_pid, request, runner_with, sh_toolchain, wait_for_exit};

#[tokio::test]
async fn test_timeout_kills_and_cleans_up() {
    let tmp = tempfile::tempdir().unwrap();
    let root = tmp.path().join("jobs");
    let pid_file = tmp.path().join("toolchain.pid");

    let mut toolchain = sh_toolchain("echo $$ > \"$PID_FILE\"; exec sleep 30");
    toolchain
        .env
        .insert("PID_FILE".to_owned(), pid_file.display().to_string());
    toolchain.limits = Some(CompileLimits::unset().with_wall_time_limit(0.5));
    let runner = runner_with(toolchain, &root);

    let started = Instant::now();
    let err = runner
        .compile(&request("fn main() {}"))
        .await
        .expect_err("Build should time out");

    assert_eq!(err.kind(), ErrorKind::Timeout);
    assert!(matches!(err, CompileError::Timeout(limit) if limit == Duration::from_millis(500)));
    assert!(started.elapsed() < Duration::from_secs(10));
    assert!(job_dirs(&root).is_empty());

    let pid = read_pid(&pid_file);
    assert!(wait_for_exit(pid).await, "toolchain {pid} still running");
}

#[cfg(target_os = "linux")]
#[tokio::test]
async fn test_timeout_kills_process_group() {
    let tmp = tempfile::tempdir().unwrap();
    let pid_file = tmp.path().join("grandchild.pid");

    // Background child in the same process group as the toolchain
    let mut toolchain = sh_toolchain("sleep 30 & echo $! > \"$PID_FILE\"; wait");
    toolchain
        .env
        .insert("PID_FILE".to_owned(), pid_file.display().to_string());
    toolchain.limits = Some(CompileLimits::unset().with_wall_time_limit(0.5));
    let runner = runner_with(toolchain, &tmp.path().join("jobs"));

    let err = runner
        .compile(&request("fn main() {}"))
        .await
        .expect_err("Build should time out");
    assert_eq!(err.kind(), ErrorKind::Timeout);

    let pid = read_pid(&pid_file);
    assert!(wait_for_exit(pid).await, "grandchild {pid} still running");
}

#[cfg(target_os = "linux")]
#[tokio::test]
async fn test_cancelled_job_cleans_up() {
    let tmp = tempfile::tempdir().unwrap();
    let root = tmp.path().join("jobs");
    let pid_file = tmp.path().join("toolchain.pid");

    let mut toolchain = sh_toolchain("echo $$ > \"$PID_FILE\"; exec sleep 30");
    toolchain
        .env
        .insert("PID_FILE".to_owned(), pid_file.display().to_string());
    let runner = runner_with(toolchain, &root);

    let job = {
        let runner = runner.clone();
        tokio::spawn(async move { runner.compile(&request("fn main() {}")).await })
    };

    // Wait until the toolchain is running
    for _ in 0..100 {
        if pid_file.exists() && std::fs::metadata(&pid_file).unwrap().len() > 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    assert_eq!(job_dirs(&root).len(), 1);

    job.abort();
    assert!(job.await.unwrap_err().is_cancelled());

    assert!(job_dirs(&root).is_empty());
    let pid = read_pid(&pid_file);
    assert!(wait_for_exit(pid).await, "toolchain {pid} still running");
}

#[cfg(target_os = "linux")]
#[tokio::test]
async fn test_cancelled_job_kills_process_group() {
    let tmp = tempfile::tempdir().unwrap();
    let pid_file = tmp.path().join("grandchild.pid");

    let mut toolchain = sh_toolchain("sleep 30 & echo $! > \"$PID_FILE\"; wait");
    toolchain
        .env
        .insert("PID_FILE".to_owned(), pid_file.display().to_string());
    let runner = runner_with(toolchain, &tmp.path().join("jobs"));

    let job = {
        let runner = runner.clone();
        tokio::spawn(async move { runner.compile(&request("fn main() {}")).await })
    };

    for _ in 0..100 {
        if pid_file.exists() && std::fs::metadata(&pid_file).unwrap().len() > 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    job.abort();
    assert!(job.await.unwrap_err().is_cancelled());

    let pid = read_pid(&pid_file);
    assert!(wait_for_exit(pid).await, "grandchild {pid} still running");
}

#[tokio::test]
async fn test_background_process_keeps_success_output() {
    let tmp = tempfile::tempdir().unwrap();
    let runner = runner_with(
        sh_toolchain("echo 'Compiling x... Finished'; sleep 5 &"),
        tmp.path(),
    );

    let started = Instant::now();
    let result = runner
        .compile(&request("fn main() {}"))
        .await
        .expect("Compilation should succeed");

    assert!(result.is_success());
    assert_eq!(result.output(), "Compiling x... Finished\n");
    assert!(!result.truncated());
    assert!(started.elapsed() < Duration::from_secs(2));
    assert!(job_dirs(tmp.path()).is_empty());
}
