//! Subprocess execution with an enforced wall-clock timeout.

use std::path::Path;
use std::process::Stdio;

use tokio::process::Command;
use tokio::time::{timeout, Duration};
use tracing::{debug, instrument, warn};

use crate::domain::errors::SolverError;

/// Captured output of a successful run.
#[derive(Debug, Clone)]
pub struct ProcessOutput {
    pub stdout: Vec<u8>,
    pub stderr: String,
}

/// Runs one external program, killing its whole process group on timeout.
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    program: String,
    timeout: Duration,
}

impl ProcessRunner {
    pub fn new(program: impl Into<String>, timeout_secs: u64) -> Self {
        Self {
            program: program.into(),
            timeout: Duration::from_secs(timeout_secs),
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// Check the program starts and exits cleanly with `probe_args`.
    pub async fn is_available(&self, probe_args: &[&str]) -> bool {
        Command::new(&self.program)
            .args(probe_args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map(|status| status.success())
            .unwrap_or(false)
    }

    /// Run the program to completion.
    ///
    /// Non-zero exit, a failure to spawn and the timeout all come back as
    /// [`SolverError`]s.
    #[instrument(skip(self, args), fields(program = %self.program))]
    pub async fn run<S: AsRef<str>>(
        &self,
        args: &[S],
        cwd: Option<&Path>,
    ) -> Result<ProcessOutput, SolverError> {
        let mut cmd = Command::new(&self.program);
        cmd.args(args.iter().map(AsRef::as_ref))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        #[cfg(unix)]
        cmd.process_group(0);
        if let Some(dir) = cwd {
            cmd.current_dir(dir);
        }

        let child = cmd.spawn().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                SolverError::Unavailable(self.program.clone())
            } else {
                SolverError::Failed {
                    program: self.program.clone(),
                    code: None,
                    stderr: format!("failed to spawn: {e}"),
                }
            }
        })?;
        let pid = child.id();
        debug!(?pid, "spawned");

        match timeout(self.timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => {
                let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
                if output.status.success() {
                    Ok(ProcessOutput {
                        stdout: output.stdout,
                        stderr,
                    })
                } else {
                    Err(SolverError::Failed {
                        program: self.program.clone(),
                        code: output.status.code(),
                        stderr,
                    })
                }
            }
            Ok(Err(e)) => Err(SolverError::Failed {
                program: self.program.clone(),
                code: None,
                stderr: format!("failed to collect output: {e}"),
            }),
            Err(_) => {
                if let Some(pid) = pid {
                    kill_process_group(pid);
                }
                warn!(timeout_secs = self.timeout.as_secs(), "killed after timeout");
                Err(SolverError::Timeout {
                    program: self.program.clone(),
                    secs: self.timeout.as_secs(),
                })
            }
        }
    }
}

#[cfg(unix)]
fn kill_process_group(pid: u32) {
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;

    let Ok(raw) = i32::try_from(pid) else {
        return;
    };
    // ESRCH just means every member already exited.
    if let Err(e) = killpg(Pid::from_raw(raw), Signal::SIGKILL) {
        debug!(pid, error = %e, "process group already gone");
    }
}

#[cfg(not(unix))]
fn kill_process_group(_pid: u32) {}
