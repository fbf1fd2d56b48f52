//! Process execution capability.
//!
//! Every strategy reaches external binaries (`docker`, `singularity`, `sbatch`)
//! through [`ProcessRunner`], so tests can swap in a scripted fake and never
//! spawn real processes.

use std::io::{self, Read};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::command::CommandOutput;
use crate::error::{Error, ExternalCommandFailedDetails, Result};
use crate::shell;

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// How the child's standard streams are wired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Collect stdout/stderr into the returned [`CommandOutput`].
    Capture,
    /// Stream to the operator's terminal. The child's stdout is sent to our
    /// stderr so stdout carries nothing but the JSON report.
    Inherit,
}

pub trait ProcessRunner {
    /// Run `program` to completion.
    ///
    /// A non-zero exit is reported through `CommandOutput::success`, not as
    /// an `Err`; errors are reserved for processes that could not be run or
    /// were cut off by a deadline.
    fn run(&self, program: &str, args: &[String], mode: OutputMode) -> Result<CommandOutput>;
}

/// Runs commands on the local machine with an optional per-command deadline.
#[derive(Debug, Clone, Default)]
pub struct SystemRunner {
    timeout: Option<Duration>,
}

impl SystemRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(timeout: Option<Duration>) -> Self {
        Self { timeout }
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }
}

impl ProcessRunner for SystemRunner {
    fn run(&self, program: &str, args: &[String], mode: OutputMode) -> Result<CommandOutput> {
        let display = shell::command_line(program, args);

        let mut cmd = Command::new(program);
        cmd.args(args).stdin(Stdio::inherit());
        match mode {
            OutputMode::Capture => {
                cmd.stdout(Stdio::piped()).stderr(Stdio::piped());
            }
            OutputMode::Inherit => {
                cmd.stdout(io::stderr()).stderr(Stdio::inherit());
            }
        }

        let mut child = cmd.spawn().map_err(|e| {
            Error::external_command_failed(ExternalCommandFailedDetails {
                command: display.clone(),
                exit_code: -1,
                stdout: String::new(),
                stderr: format!("Command error: {}", e),
            })
        })?;

        // Drain pipes while waiting so a chatty child never blocks on a full buffer.
        let stdout_reader = child.stdout.take().map(spawn_reader);
        let stderr_reader = child.stderr.take().map(spawn_reader);

        let status = wait_with_deadline(&mut child, self.timeout, &display)?;

        Ok(CommandOutput {
            stdout: join_reader(stdout_reader),
            stderr: join_reader(stderr_reader),
            success: status.success(),
            exit_code: status.code().unwrap_or(-1),
        })
    }
}

fn spawn_reader<R: Read + Send + 'static>(mut source: R) -> JoinHandle<String> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = source.read_to_end(&mut buf);
        String::from_utf8_lossy(&buf).into_owned()
    })
}

fn join_reader(reader: Option<JoinHandle<String>>) -> String {
    reader
        .map(|handle| handle.join().unwrap_or_default())
        .unwrap_or_default()
}

fn wait_with_deadline(
    child: &mut Child,
    timeout: Option<Duration>,
    command: &str,
) -> Result<ExitStatus> {
    let wait_error =
        |e: io::Error| Error::internal_io(e.to_string(), Some(format!("wait for {}", command)));

    let Some(timeout) = timeout else {
        return child.wait().map_err(wait_error);
    };

    let deadline = Instant::now() + timeout;
    loop {
        if let Some(status) = child.try_wait().map_err(wait_error)? {
            return Ok(status);
        }
        if Instant::now() >= deadline {
            let _ = child.kill();
            let _ = child.wait();
            return Err(Error::external_command_timeout(command, timeout));
        }
        thread::sleep(POLL_INTERVAL);
    }
}
