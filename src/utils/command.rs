//! Command result primitives with consistent error handling.

use serde::Serialize;

use crate::error::{Error, ExternalCommandFailedDetails, Result};

/// Result of one external process invocation.
///
/// `stdout`/`stderr` are empty when the process wrote straight to the terminal.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandOutput {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub stdout: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub stderr: String,
    pub success: bool,
    pub exit_code: i32,
}

impl CommandOutput {
    pub fn succeeded(stdout: impl Into<String>) -> Self {
        Self {
            stdout: stdout.into(),
            stderr: String::new(),
            success: true,
            exit_code: 0,
        }
    }

    pub fn failed(exit_code: i32, stderr: impl Into<String>) -> Self {
        Self {
            stdout: String::new(),
            stderr: stderr.into(),
            success: false,
            exit_code,
        }
    }
}

/// Extract error text from command output.
///
/// Prefers stderr, falls back to stdout if stderr is empty.
pub fn error_text(output: &CommandOutput) -> String {
    if !output.stderr.trim().is_empty() {
        output.stderr.trim().to_string()
    } else {
        output.stdout.trim().to_string()
    }
}

/// Require a command to have exited successfully.
///
/// `command` is the rendered command line, used in the error details.
pub fn require_success(output: &CommandOutput, command: &str) -> Result<()> {
    if output.success {
        return Ok(());
    }

    Err(Error::external_command_failed(ExternalCommandFailedDetails {
        command: command.to_string(),
        exit_code: output.exit_code,
        stdout: output.stdout.trim().to_string(),
        stderr: output.stderr.trim().to_string(),
    })
    .with_hint(format!("Command output: {}", error_text(output))))
}
