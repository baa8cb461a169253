//! Synchronous external command execution.
//!
//! Every OS utility the engine drives (`hdiutil`, `installer`, `curl`,
//! `system_profiler`, ...) goes through the [`Executor`] trait so that
//! components can be exercised against a fake in tests.  The production
//! implementation, [`SystemExecutor`], blocks until the child exits, but
//! never longer than its configured timeout, and kills the child when the
//! process receives Ctrl-C.
use std::io::{Read, Write as _};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use thiserror::Error;

use crate::interrupt;

/// Default per-invocation timeout (30 minutes; large package installs are slow).
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30 * 60);

const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Result of a command execution.
///
/// Output is kept as raw bytes: several utilities emit binary property lists.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ExecResult {
    /// Captured standard output.
    pub stdout: Vec<u8>,
    /// Captured standard error.
    pub stderr: Vec<u8>,
    /// Exit code, or `None` if the process was terminated by a signal.
    pub code: Option<i32>,
}

impl ExecResult {
    /// Build a successful result with the given stdout.
    #[must_use]
    pub fn ok(stdout: impl Into<Vec<u8>>) -> Self {
        Self {
            stdout: stdout.into(),
            stderr: Vec::new(),
            code: Some(0),
        }
    }

    /// Build a failed result with the given exit code and stderr.
    #[must_use]
    pub fn failed(code: i32, stderr: impl Into<Vec<u8>>) -> Self {
        Self {
            stdout: Vec::new(),
            stderr: stderr.into(),
            code: Some(code),
        }
    }

    /// Whether the process exited with status zero.
    #[must_use]
    pub const fn success(&self) -> bool {
        matches!(self.code, Some(0))
    }

    /// Standard output decoded lossily as UTF-8.
    #[must_use]
    pub fn stdout_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    /// Standard error decoded lossily as UTF-8.
    #[must_use]
    pub fn stderr_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stderr).into_owned()
    }

    /// Short human-readable reason for a failed invocation.
    #[must_use]
    pub fn failure_reason(&self) -> String {
        let stderr = self.stderr_lossy();
        let stderr = stderr.trim();
        match (self.code, stderr.is_empty()) {
            (Some(code), true) => format!("exit {code}"),
            (Some(code), false) => format!("exit {code}: {stderr}"),
            (None, true) => "terminated by signal".to_string(),
            (None, false) => format!("terminated by signal: {stderr}"),
        }
    }
}

/// Errors raised while invoking an external command.
#[derive(Error, Debug)]
pub enum ExecError {
    /// The process could not be started at all.
    #[error("failed to start {program}: {source}")]
    Spawn {
        /// Program that was invoked.
        program: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Talking to the running process failed (pipe or wait error).
    #[error("I/O error while running {program}: {source}")]
    Io {
        /// Program that was invoked.
        program: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The process did not exit within the configured timeout and was killed.
    #[error("{program} timed out after {}s", timeout.as_secs())]
    TimedOut {
        /// Program that was invoked.
        program: String,
        /// Timeout that elapsed.
        timeout: Duration,
    },

    /// The process was killed because the user pressed Ctrl-C.
    #[error("{program} was interrupted")]
    Interrupted {
        /// Program that was invoked.
        program: String,
    },

    /// A checked invocation exited non-zero.
    #[error("{program} failed (exit {code}): {stderr}")]
    NonZeroExit {
        /// Program that was invoked.
        program: String,
        /// Exit code (`-1` when killed by a signal).
        code: i32,
        /// Captured standard error, trimmed.
        stderr: String,
    },

    /// A checked invocation exited zero but wrote to stderr.
    #[error("{program} reported errors: {stderr}")]
    Stderr {
        /// Program that was invoked.
        program: String,
        /// Captured standard error, trimmed.
        stderr: String,
    },
}

/// Abstraction over external command execution.
///
/// Programs are referenced by absolute path; arguments are forwarded verbatim.
pub trait Executor: Send + Sync + std::fmt::Debug {
    /// Run a command and capture its output. Only fails if the process
    /// cannot be started, times out, or is interrupted.
    ///
    /// # Errors
    ///
    /// Returns [`ExecError`] if the process cannot be run to completion.
    fn run(&self, program: &str, args: &[&str]) -> Result<ExecResult, ExecError>;

    /// Like [`run`](Self::run), but writes `stdin` to the process's input
    /// stream before closing it.
    ///
    /// # Errors
    ///
    /// Returns [`ExecError`] if the process cannot be run to completion.
    fn run_interactive(
        &self,
        program: &str,
        args: &[&str],
        stdin: &[u8],
    ) -> Result<ExecResult, ExecError>;

    /// Run a command and treat a non-zero exit or any stderr output as failure.
    ///
    /// # Errors
    ///
    /// Returns [`ExecError::NonZeroExit`] or [`ExecError::Stderr`] in
    /// addition to the errors of [`run`](Self::run).
    fn run_checked(&self, program: &str, args: &[&str]) -> Result<ExecResult, ExecError> {
        check(program, self.run(program, args)?)
    }
}

/// Apply the checked-invocation policy to a finished command.
///
/// Any stderr output counts as failure, even with exit status zero.
///
/// # Errors
///
/// Returns [`ExecError::NonZeroExit`] for a non-zero exit and
/// [`ExecError::Stderr`] when stderr is non-empty.
pub fn check(program: &str, result: ExecResult) -> Result<ExecResult, ExecError> {
    if !result.success() {
        return Err(ExecError::NonZeroExit {
            program: program.to_string(),
            code: result.code.unwrap_or(-1),
            stderr: result.stderr_lossy().trim().to_string(),
        });
    }
    if !result.stderr.is_empty() {
        return Err(ExecError::Stderr {
            program: program.to_string(),
            stderr: result.stderr_lossy().trim().to_string(),
        });
    }
    Ok(result)
}

/// Production [`Executor`] that spawns real processes.
#[derive(Debug, Clone, Copy)]
pub struct SystemExecutor {
    timeout: Duration,
    interrupt: &'static AtomicBool,
}

impl Default for SystemExecutor {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEOUT)
    }
}

impl SystemExecutor {
    /// Create an executor that kills any child still running after `timeout`.
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            interrupt: interrupt::flag(),
        }
    }

    /// Watch `flag` instead of the process-wide Ctrl-C flag.
    #[must_use]
    pub const fn with_interrupt_flag(mut self, flag: &'static AtomicBool) -> Self {
        self.interrupt = flag;
        self
    }

    /// The configured per-invocation timeout.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    fn execute(
        &self,
        program: &str,
        args: &[&str],
        stdin: Option<&[u8]>,
    ) -> Result<ExecResult, ExecError> {
        tracing::debug!(program, ?args, "executing");
        let started = Instant::now();

        let mut child = Command::new(program)
            .args(args)
            .stdin(if stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| ExecError::Spawn {
                program: program.to_string(),
                source,
            })?;

        let writer = stdin.map(|bytes| feed_stdin(&mut child, bytes));
        let stdout = spawn_reader(child.stdout.take());
        let stderr = spawn_reader(child.stderr.take());

        let status = self.wait(&mut child, program)?;

        // The child may exit without ever reading its input.
        if let Some(writer) = writer {
            let _ = writer.join();
        }

        let result = ExecResult {
            stdout: join_reader(stdout, program)?,
            stderr: join_reader(stderr, program)?,
            code: status.code(),
        };
        tracing::debug!(
            program,
            code = ?result.code,
            elapsed = ?started.elapsed(),
            "command finished"
        );
        Ok(result)
    }

    fn wait(&self, child: &mut Child, program: &str) -> Result<ExitStatus, ExecError> {
        let deadline = Instant::now() + self.timeout;
        loop {
            let polled = child.try_wait().map_err(|source| ExecError::Io {
                program: program.to_string(),
                source,
            })?;
            if let Some(status) = polled {
                return Ok(status);
            }
            if self.interrupt.swap(false, Ordering::SeqCst) {
                kill(child);
                tracing::warn!(program, "killed after interrupt");
                return Err(ExecError::Interrupted {
                    program: program.to_string(),
                });
            }
            if Instant::now() >= deadline {
                kill(child);
                tracing::warn!(program, timeout = ?self.timeout, "killed after timeout");
                return Err(ExecError::TimedOut {
                    program: program.to_string(),
                    timeout: self.timeout,
                });
            }
            thread::sleep(POLL_INTERVAL);
        }
    }
}

impl Executor for SystemExecutor {
    fn run(&self, program: &str, args: &[&str]) -> Result<ExecResult, ExecError> {
        self.execute(program, args, None)
    }

    fn run_interactive(
        &self,
        program: &str,
        args: &[&str],
        stdin: &[u8],
    ) -> Result<ExecResult, ExecError> {
        self.execute(program, args, Some(stdin))
    }
}

fn kill(child: &mut Child) {
    let _ = child.kill();
    let _ = child.wait();
}

/// Write `bytes` to the child's stdin on a helper thread and close the pipe.
///
/// Broken-pipe errors are ignored: a child that never prompts exits without
/// draining its input.
fn feed_stdin(child: &mut Child, bytes: &[u8]) -> JoinHandle<()> {
    let pipe = child.stdin.take();
    let bytes = bytes.to_vec();
    thread::spawn(move || {
        if let Some(mut pipe) = pipe {
            let _ = pipe.write_all(&bytes);
        }
    })
}

fn spawn_reader<R: Read + Send + 'static>(
    pipe: Option<R>,
) -> JoinHandle<std::io::Result<Vec<u8>>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            pipe.read_to_end(&mut buf)?;
        }
        Ok(buf)
    })
}

fn join_reader(
    handle: JoinHandle<std::io::Result<Vec<u8>>>,
    program: &str,
) -> Result<Vec<u8>, ExecError> {
    handle
        .join()
        .unwrap_or_else(|_| Err(std::io::Error::other("output reader panicked")))
        .map_err(|source| ExecError::Io {
            program: program.to_string(),
            source,
        })
}
