use crate::runtime::{self, BoxFuture};
use crate::{CommandResult, CommandSpec, Error, Result};

use async_trait::async_trait;
use futures_lite::io::AsyncReadExt;
use futures_util::FutureExt;
use tokio_util::sync::CancellationToken;

use std::fmt;
use std::process::{ExitStatus, Stdio};
use std::time::Instant;

/// Runs one subprocess to completion.
///
/// Implementations must:
/// - capture stdout and stderr in full (invalid UTF-8 becomes the empty string),
/// - return `Error::CommandTimedOut` after terminating the process when `spec.timeout` elapses,
/// - return `Ok` with `cancelled = true` after terminating the process when `cancel` fires,
/// - return `Error::LaunchFailed` when the process cannot be started.
///
/// Whichever of exit, timeout or cancellation happens first decides the outcome.
#[async_trait]
pub trait CommandRunner: fmt::Debug + Send + Sync {
    async fn execute(&self, spec: &CommandSpec, cancel: &CancellationToken) -> Result<CommandResult>;
}

/// `CommandRunner` backed by `async-process`.
#[derive(Clone, Debug, Default)]
pub struct ProcessRunner {
    _priv: (),
}

impl ProcessRunner {
    pub fn new() -> Self {
        Self::default()
    }
}

enum Outcome {
    Exited(std::io::Result<ExitStatus>),
    TimedOut,
    Cancelled,
}

#[async_trait]
impl CommandRunner for ProcessRunner {
    async fn execute(&self, spec: &CommandSpec, cancel: &CancellationToken) -> Result<CommandResult> {
        let started = Instant::now();
        let program = spec.program.to_string_lossy().into_owned();

        if cancel.is_cancelled() {
            return Ok(cancelled_result(spec, started));
        }

        #[cfg(feature = "tracing")]
        tracing::debug!(command = %spec.display_line(), timeout = ?spec.timeout, "spawn");

        let mut cmd = async_process::Command::new(&spec.program);
        cmd.args(&spec.args)
            .envs(&spec.env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|e| Error::LaunchFailed {
            program: program.clone(),
            detail: e.to_string(),
            missing: e.kind() == std::io::ErrorKind::NotFound,
        })?;

        let mut stdout_buf = Vec::<u8>::new();
        let mut stderr_buf = Vec::<u8>::new();

        let outcome = {
            let mut collect =
                Box::pin(collect_output(&mut child, &mut stdout_buf, &mut stderr_buf)).fuse();
            let deadline: BoxFuture<()> = match spec.timeout {
                Some(t) => runtime::sleep(t),
                None => Box::pin(std::future::pending()),
            };
            let mut deadline = deadline.fuse();
            let mut cancelled = Box::pin(cancel.cancelled()).fuse();

            futures_util::select! {
                status = collect => Outcome::Exited(status),
                _ = deadline => Outcome::TimedOut,
                _ = cancelled => Outcome::Cancelled,
            }
        };

        match outcome {
            Outcome::Exited(status) => {
                let status = status.map_err(|e| Error::io(format!("wait {program}: {e}")))?;
                let result = CommandResult {
                    executable_path: spec.program.clone(),
                    arguments: spec.args.clone(),
                    stdout: String::from_utf8(stdout_buf).unwrap_or_default(),
                    stderr: String::from_utf8(stderr_buf).unwrap_or_default(),
                    exit_code: status.code().unwrap_or(-1),
                    cancelled: false,
                    duration: started.elapsed(),
                };

                #[cfg(feature = "tracing")]
                tracing::debug!(
                    command = %spec.display_line(),
                    exit_code = result.exit_code,
                    duration = ?result.duration,
                    stdout_bytes = result.stdout.len(),
                    stderr_bytes = result.stderr.len(),
                    "process exited"
                );

                Ok(result)
            }
            Outcome::TimedOut => {
                let _ = child.kill();
                let _ = child.status().await;

                #[cfg(feature = "tracing")]
                tracing::warn!(command = %spec.display_line(), timeout = ?spec.timeout, "process timed out");

                Err(Error::CommandTimedOut {
                    command: spec.display_line(),
                    timeout: spec.timeout.unwrap_or_default(),
                })
            }
            Outcome::Cancelled => {
                let _ = child.kill();
                let _ = child.status().await;

                #[cfg(feature = "tracing")]
                tracing::debug!(command = %spec.display_line(), "process cancelled");

                Ok(cancelled_result(spec, started))
            }
        }
    }
}

async fn collect_output(
    child: &mut async_process::Child,
    stdout: &mut Vec<u8>,
    stderr: &mut Vec<u8>,
) -> std::io::Result<ExitStatus> {
    let out_pipe = child.stdout.take();
    let err_pipe = child.stderr.take();

    let read_out = async move {
        match out_pipe {
            Some(mut p) => p.read_to_end(stdout).await.map(|_| ()),
            None => Ok(()),
        }
    };
    let read_err = async move {
        match err_pipe {
            Some(mut p) => p.read_to_end(stderr).await.map(|_| ()),
            None => Ok(()),
        }
    };

    let (out, err) = futures_lite::future::zip(read_out, read_err).await;
    out?;
    err?;
    child.status().await
}

fn cancelled_result(spec: &CommandSpec, started: Instant) -> CommandResult {
    CommandResult {
        executable_path: spec.program.clone(),
        arguments: spec.args.clone(),
        stdout: String::new(),
        stderr: String::new(),
        exit_code: -1,
        cancelled: true,
        duration: started.elapsed(),
    }
}
