//! External plugin execution through the system shell

use anyhow::{Context, Result};
use chrono::Utc;
use nix::sys::signal::{killpg, Signal};
use nix::unistd::Pid;
use std::io::Read;
use std::os::unix::process::CommandExt;
use std::process::{Child, Command, Stdio};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;
use tracing::{debug, warn};
use wait_timeout::ChildExt;

use super::{CommandExecutor, ExecutionOutcome};

/// Timeout for collecting output from child process pipes
const OUTPUT_COLLECTION_TIMEOUT: Duration = Duration::from_secs(5);

/// Maximum plugin output kept per check (64KB)
pub const MAX_OUTPUT_SIZE: usize = 64 * 1024;

/// Runs check command lines with `sh -c`, each in its own process group so
/// a timeout takes down everything the plugin started.
#[derive(Debug, Clone, Copy, Default)]
pub struct ShellExecutor;

impl CommandExecutor for ShellExecutor {
    fn execute(&self, command: &str, timeout: Duration) -> Result<ExecutionOutcome> {
        let start_time = Utc::now();
        let mut child = spawn_shell_command(command)?;

        // Drain the pipes while waiting so a chatty plugin cannot block on a
        // full pipe buffer
        let (stdout_tx, stdout_rx) = mpsc::channel();
        match child.stdout.take() {
            Some(stdout) => {
                thread::spawn(move || {
                    let _ = stdout_tx.send(read_stream_to_string(stdout));
                });
            }
            None => {
                let _ = stdout_tx.send(String::new());
            }
        }
        // stderr is drained and dropped
        if let Some(stderr) = child.stderr.take() {
            thread::spawn(move || {
                let _ = read_stream_to_string(stderr);
            });
        }

        let wait_result = child
            .wait_timeout(timeout)
            .with_context(|| format!("Failed to wait for check command: {command}"))?;

        let outcome = match wait_result {
            Some(status) => {
                let output = stdout_rx
                    .recv_timeout(OUTPUT_COLLECTION_TIMEOUT)
                    .unwrap_or_default();
                ExecutionOutcome {
                    // Killed by a signal: no exit code
                    return_code: status.code().unwrap_or(2),
                    exited_ok: status.code().is_some(),
                    early_timeout: false,
                    output,
                    start_time,
                    finish_time: Utc::now(),
                }
            }
            None => {
                warn!(
                    "Check command timed out after {}s, killing process group: {}",
                    timeout.as_secs(),
                    command
                );
                kill_process_group(&mut child);
                let output = stdout_rx
                    .recv_timeout(OUTPUT_COLLECTION_TIMEOUT)
                    .unwrap_or_default();
                ExecutionOutcome {
                    return_code: 2,
                    exited_ok: false,
                    early_timeout: true,
                    output,
                    start_time,
                    finish_time: Utc::now(),
                }
            }
        };
        debug!(
            "Check command exited with {} after {:.3}s",
            outcome.return_code,
            outcome.execution_time()
        );
        Ok(outcome)
    }
}

/// Spawn `sh -c <command>` in a new process group with stdin closed
pub(crate) fn spawn_shell_command(command: &str) -> Result<Child> {
    let mut cmd = Command::new("sh");
    cmd.arg("-c")
        .arg(command)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .process_group(0);

    cmd.spawn()
        .with_context(|| format!("Failed to spawn check command: {command}"))
}

/// Read a stream to string, keeping at most `MAX_OUTPUT_SIZE` bytes and
/// draining the rest so the writer never sees a broken pipe.
fn read_stream_to_string<R: Read>(mut stream: R) -> String {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 8192];

    loop {
        match stream.read(&mut chunk) {
            Ok(0) => break,
            Ok(n) => {
                let remaining = MAX_OUTPUT_SIZE.saturating_sub(buf.len());
                let to_copy = n.min(remaining);
                buf.extend_from_slice(&chunk[..to_copy]);
                if to_copy < n {
                    let mut discard = [0u8; 8192];
                    while stream.read(&mut discard).unwrap_or(0) > 0 {}
                    break;
                }
            }
            Err(_) => break,
        }
    }

    String::from_utf8_lossy(&buf).to_string()
}

/// SIGKILL the child's whole process group, then reap the child
fn kill_process_group(child: &mut Child) {
    let pgid = Pid::from_raw(child.id() as i32);
    if killpg(pgid, Signal::SIGKILL).is_err() {
        let _ = child.kill();
    }
    let _ = child.wait();
}
