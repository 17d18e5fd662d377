//! Process spawning and output capture for the toolchain
//!
//! Runs a command to completion or until its deadline, reading stdout and
//! stderr concurrently so a chatty child never blocks on a full pipe.

use std::time::{Duration, Instant};

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, instrument, warn};

use crate::toolchain::ToolchainError;
use crate::toolchain::command::ToolchainCommand;

/// How long to wait for the output pipes to close once the process group is
/// gone. A process that left the group (e.g. via `setsid`) can hold them open.
const DRAIN_GRACE: Duration = Duration::from_secs(2);

const READ_CHUNK: usize = 8192;

/// Bytes read from one output stream
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CapturedStream {
    pub bytes: Vec<u8>,
    /// Whether output beyond the cap (or after the drain grace) was discarded
    pub truncated: bool,
}

impl CapturedStream {
    /// Decode as UTF-8, replacing invalid sequences
    pub fn to_string_lossy(&self) -> String {
        String::from_utf8_lossy(&self.bytes).into_owned()
    }
}

/// Result of running a toolchain process
#[derive(Debug, Clone, Default)]
pub struct ProcessOutput {
    /// Exit code if the process exited normally
    pub exit_code: Option<i32>,
    /// Signal number if the process was killed by a signal
    pub signal: Option<i32>,
    pub stdout: CapturedStream,
    pub stderr: CapturedStream,
    /// Wall clock time from spawn to exit
    pub elapsed: Duration,
    /// Whether the deadline expired and the process was killed
    pub timed_out: bool,
}

impl ProcessOutput {
    /// Check if the process exited with code 0 within its deadline
    pub fn is_success(&self) -> bool {
        !self.timed_out && self.exit_code == Some(0)
    }
}

/// Process group of a spawned toolchain, killed on drop
///
/// Dropping the future of [`run_with_output`] (a cancelled job) drops this
/// guard, so background processes the toolchain started die with it.
struct ProcessGroup {
    pgid: Option<u32>,
}

impl ProcessGroup {
    fn new(pgid: Option<u32>) -> Self {
        Self { pgid }
    }

    /// Send SIGKILL to every member of the group
    ///
    /// Returns whether any process was signalled. Later calls do nothing.
    fn kill(&mut self) -> bool {
        let Some(pgid) = self.pgid.take() else {
            return false;
        };
        match signal_group(pgid) {
            Ok(()) => true,
            Err(e) if e.raw_os_error() == Some(libc::ESRCH) => false,
            Err(e) => {
                warn!(pgid, error = %e, "failed to kill toolchain process group");
                false
            }
        }
    }
}

impl Drop for ProcessGroup {
    fn drop(&mut self) {
        if self.kill() {
            debug!("killed toolchain process group on drop");
        }
    }
}

/// Run a command and capture its output
///
/// Each stream keeps at most `max_output` bytes; the rest is read and
/// dropped. When `deadline` expires, the whole process group is killed and
/// reaped before returning with `timed_out` set. Processes left in the group
/// after a normal exit are killed too, so nothing outlives the call.
#[instrument(skip(command), fields(args = ?command.args()))]
pub async fn run_with_output(
    command: ToolchainCommand,
    deadline: Option<Duration>,
    max_output: usize,
) -> Result<ProcessOutput, ToolchainError> {
    let mut process = command.build()?;

    let started = Instant::now();
    let mut child = process.spawn().map_err(ToolchainError::SpawnFailed)?;
    // Declared after the child so it drops first, while the pid is unreaped
    let mut group = ProcessGroup::new(child.id());
    debug!(pid = ?child.id(), "spawned toolchain process");

    let (stop, stop_rx) = watch::channel(false);
    let stdout_task = tokio::spawn(read_capped(child.stdout.take(), max_output, stop_rx.clone()));
    let stderr_task = tokio::spawn(read_capped(child.stderr.take(), max_output, stop_rx));

    let (status, timed_out) = match deadline {
        Some(limit) => match tokio::time::timeout(limit, child.wait()).await {
            Ok(status) => (status?, false),
            Err(_) => {
                warn!(?limit, pid = ?child.id(), "toolchain deadline expired, killing process group");
                if !group.kill() {
                    if let Err(e) = child.start_kill() {
                        warn!(error = %e, "failed to kill toolchain process");
                    }
                }
                (child.wait().await?, true)
            }
        },
        None => (child.wait().await?, false),
    };
    let elapsed = started.elapsed();

    if group.kill() {
        debug!("killed processes left in the toolchain group");
    }

    let (stdout, stderr) = drain(stdout_task, stderr_task, stop).await?;

    let output = ProcessOutput {
        exit_code: status.code(),
        signal: exit_signal(&status),
        stdout,
        stderr,
        elapsed,
        timed_out,
    };

    debug!(
        exit_code = ?output.exit_code,
        signal = ?output.signal,
        timed_out,
        elapsed_ms = elapsed.as_millis() as u64,
        stdout_len = output.stdout.bytes.len(),
        stderr_len = output.stderr.bytes.len(),
        "toolchain process finished"
    );

    Ok(output)
}

/// Read a stream to EOF or until `stop` fires, keeping at most `limit` bytes
///
/// A stop before EOF keeps what was read so far and marks it truncated.
async fn read_capped<R>(
    reader: Option<R>,
    limit: usize,
    mut stop: watch::Receiver<bool>,
) -> std::io::Result<CapturedStream>
where
    R: AsyncRead + Unpin,
{
    let mut captured = CapturedStream::default();
    let Some(mut reader) = reader else {
        return Ok(captured);
    };

    let mut buf = vec![0u8; READ_CHUNK];
    loop {
        let n = tokio::select! {
            read = reader.read(&mut buf) => read?,
            _ = stop.changed() => {
                captured.truncated = true;
                break;
            }
        };
        if n == 0 {
            break;
        }
        let room = limit.saturating_sub(captured.bytes.len());
        if n <= room {
            captured.bytes.extend_from_slice(&buf[..n]);
        } else {
            captured.bytes.extend_from_slice(&buf[..room]);
            captured.truncated = true;
        }
    }

    Ok(captured)
}

type ReaderTask = JoinHandle<std::io::Result<CapturedStream>>;

/// Wait for both readers together, stopping them after [`DRAIN_GRACE`]
async fn drain(
    stdout: ReaderTask,
    stderr: ReaderTask,
    stop: watch::Sender<bool>,
) -> Result<(CapturedStream, CapturedStream), ToolchainError> {
    let readers = async { tokio::join!(stdout, stderr) };
    tokio::pin!(readers);

    let (stdout, stderr) = tokio::select! {
        results = &mut readers => results,
        _ = tokio::time::sleep(DRAIN_GRACE) => {
            warn!("output pipe still open after toolchain exit, keeping partial output");
            let _ = stop.send(true);
            readers.await
        }
    };

    Ok((joined(stdout)?, joined(stderr)?))
}

fn joined(
    result: Result<std::io::Result<CapturedStream>, tokio::task::JoinError>,
) -> Result<CapturedStream, ToolchainError> {
    match result {
        Ok(captured) => Ok(captured?),
        Err(join_error) => Err(ToolchainError::Capture(join_error.to_string())),
    }
}

#[cfg(unix)]
fn signal_group(pgid: u32) -> std::io::Result<()> {
    // SAFETY: killpg only sends a signal. A group id is not reused while any
    // member is alive, and an empty group fails with ESRCH.
    let rc = unsafe { libc::killpg(pgid as libc::pid_t, libc::SIGKILL) };
    if rc == 0 {
        Ok(())
    } else {
        Err(std::io::Error::last_os_error())
    }
}

#[cfg(not(unix))]
fn signal_group(_pgid: u32) -> std::io::Result<()> {
    Err(std::io::Error::from(std::io::ErrorKind::Unsupported))
}

#[cfg(unix)]
fn exit_signal(status: &std::process::ExitStatus) -> Option<i32> {
    use std::os::unix::process::ExitStatusExt;
    status.signal()
}

#[cfg(not(unix))]
fn exit_signal(_status: &std::process::ExitStatus) -> Option<i32> {
    None
}
