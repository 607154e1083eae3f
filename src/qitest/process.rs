// src/qitest/process.rs

//! Running one test process with a timeout and cancellation.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::qitest::result::Outcome;

/// How long to keep draining the pipes once the process is gone. A
/// grandchild holding the pipe open must not block the run.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(1);

/// Everything needed to start a process.
#[derive(Debug, Clone)]
pub struct ProcessSpec {
    pub cmd: Vec<String>,
    pub cwd: PathBuf,
    /// Complete environment of the process.
    pub env: BTreeMap<String, String>,
    pub timeout: Option<Duration>,
    /// Capture stdout/stderr instead of letting them through.
    pub capture: bool,
    /// Time given to a timed out process between the polite and the forced
    /// kill.
    pub kill_grace: Duration,
}

#[derive(Debug, Clone)]
pub struct ProcessRun {
    pub outcome: Outcome,
    pub output: String,
    pub elapsed: Duration,
}

impl ProcessRun {
    fn not_started(outcome: Outcome) -> Self {
        Self {
            outcome,
            output: String::new(),
            elapsed: Duration::ZERO,
        }
    }
}

/// Run the process described by `spec` to completion.
///
/// The process ends in exactly one of three ways: it exits, its timeout
/// fires, or `interrupt` flips to `true`. Only harness failures (waiting on
/// the child failed) are returned as errors.
pub async fn run_process(
    spec: &ProcessSpec,
    interrupt: &mut watch::Receiver<bool>,
) -> Result<ProcessRun> {
    let Some(program) = spec.cmd.first() else {
        return Ok(ProcessRun::not_started(Outcome::NotRun(
            "empty command".to_string(),
        )));
    };

    let program_path = Path::new(program);
    if program_path.components().count() > 1 && !program_path.exists() {
        return Ok(ProcessRun::not_started(Outcome::NotRun(format!(
            "no such file or directory: {program}"
        ))));
    }

    if *interrupt.borrow() {
        return Ok(ProcessRun::not_started(Outcome::Interrupted));
    }

    let mut std_cmd = std::process::Command::new(program);
    std_cmd
        .args(&spec.cmd[1..])
        .current_dir(&spec.cwd)
        .env_clear()
        .envs(&spec.env)
        .stdin(Stdio::null());
    if spec.capture {
        std_cmd.stdout(Stdio::piped()).stderr(Stdio::piped());
    } else {
        std_cmd.stdout(Stdio::inherit()).stderr(Stdio::inherit());
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        std_cmd.process_group(0);
    }
    let mut cmd = Command::from(std_cmd);
    cmd.kill_on_drop(true);

    let start = Instant::now();
    let mut child = match cmd.spawn() {
        Ok(child) => child,
        Err(err) => {
            debug!(program = %program, error = %err, "failed to spawn test process");
            let reason = if err.kind() == std::io::ErrorKind::NotFound {
                format!("no such file or directory: {program}")
            } else {
                err.to_string()
            };
            return Ok(ProcessRun::not_started(Outcome::NotRun(reason)));
        }
    };

    let buffer = Arc::new(Mutex::new(Vec::new()));
    let mut readers = Vec::new();
    if let Some(stdout) = child.stdout.take() {
        readers.push(spawn_reader(stdout, buffer.clone()));
    }
    if let Some(stderr) = child.stderr.take() {
        readers.push(spawn_reader(stderr, buffer.clone()));
    }

    let deadline = async {
        match spec.timeout {
            Some(timeout) => tokio::time::sleep(timeout).await,
            None => std::future::pending::<()>().await,
        }
    };

    let outcome = tokio::select! {
        status = child.wait() => {
            let status = status.with_context(|| format!("waiting for process '{program}'"))?;
            classify(status)
        }

        _ = deadline => {
            info!(program = %program, timeout = ?spec.timeout, "test timed out; terminating");
            terminate(&mut child, spec.kill_grace).await
        }

        _ = wait_for_interrupt(interrupt) => {
            info!(program = %program, "run interrupted; killing test process");
            kill(&mut child).await;
            Outcome::Interrupted
        }
    };
    let elapsed = start.elapsed();

    for reader in readers {
        if tokio::time::timeout(DRAIN_TIMEOUT, reader).await.is_err() {
            debug!(program = %program, "output still open after process exit; giving up on it");
        }
    }

    let output = {
        let bytes = buffer.lock().unwrap_or_else(|e| e.into_inner());
        String::from_utf8_lossy(&bytes).into_owned()
    };

    Ok(ProcessRun {
        outcome,
        output,
        elapsed,
    })
}

fn spawn_reader<R>(stream: R, buffer: Arc<Mutex<Vec<u8>>>) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut reader = BufReader::new(stream);
        let mut line = Vec::new();
        loop {
            line.clear();
            match reader.read_until(b'\n', &mut line).await {
                Ok(0) => break,
                Ok(_) => buffer
                    .lock()
                    .unwrap_or_else(|e| e.into_inner())
                    .extend_from_slice(&line),
                Err(err) => {
                    debug!(error = %err, "error reading test output");
                    break;
                }
            }
        }
    })
}

async fn wait_for_interrupt(interrupt: &mut watch::Receiver<bool>) {
    let closed = interrupt.wait_for(|interrupted| *interrupted).await.is_err();
    if closed {
        // Sender gone: nobody can interrupt us anymore.
        std::future::pending::<()>().await;
    }
}

fn classify(status: ExitStatus) -> Outcome {
    if status.success() {
        return Outcome::Ok;
    }
    if let Some(code) = status.code() {
        return Outcome::Failed(code);
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return Outcome::Signaled(signal);
        }
    }
    Outcome::Failed(-1)
}

/// Ask the process group to stop, then force it after `grace`.
async fn terminate(child: &mut Child, grace: Duration) -> Outcome {
    #[cfg(unix)]
    {
        signal_group(child, libc::SIGTERM);
        match tokio::time::timeout(grace, child.wait()).await {
            Ok(_) => Outcome::TimedOut,
            Err(_) => {
                warn!(pid = ?child.id(), "test process ignored SIGTERM; killing it");
                kill(child).await;
                Outcome::Zombie
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = grace;
        kill(child).await;
        Outcome::TimedOut
    }
}

async fn kill(child: &mut Child) {
    #[cfg(unix)]
    signal_group(child, libc::SIGKILL);
    if let Err(err) = child.kill().await {
        debug!(error = %err, "failed to kill test process");
    }
}

/// Signal the whole process group started for the test, so helpers it
/// spawned go down with it.
#[cfg(unix)]
fn signal_group(child: &Child, signal: libc::c_int) {
    let Some(pid) = child.id() else {
        return;
    };
    let Ok(pid) = libc::pid_t::try_from(pid) else {
        return;
    };
    // SAFETY: kill(2) has no memory safety requirements. The negative pid
    // targets the group created with `process_group(0)` at spawn.
    let rc = unsafe { libc::kill(-pid, signal) };
    if rc != 0 {
        debug!(pid, signal, error = %std::io::Error::last_os_error(), "kill failed");
    }
}
