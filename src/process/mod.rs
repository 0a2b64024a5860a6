//! External process execution.
//!
//! Two disciplines live here and are never interchanged:
//!
//! * run-to-completion through a [`CommandRunner`], either capturing output
//!   ([`ProcessCommandRunner`]) or inheriting the terminal
//!   ([`StreamingCommandRunner`]);
//! * process-image replacement through [`replace_process`], which only
//!   returns when the replacement could not happen.

use std::fmt;
use std::process::Command;

use shell_escape::unix::escape;
use thiserror::Error;
use tracing::debug;

/// Program name and argument vector for an external command.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CommandSpec {
    program: String,
    args: Vec<String>,
}

impl CommandSpec {
    /// Starts a command for `program` with no arguments.
    #[must_use]
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// Appends a single argument.
    #[must_use]
    pub fn arg(mut self, value: impl Into<String>) -> Self {
        self.args.push(value.into());
        self
    }

    /// Appends every argument yielded by `values`.
    #[must_use]
    pub fn with_args<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.extend_args(values);
        self
    }

    /// Appends an argument in place.
    pub fn push_arg(&mut self, value: impl Into<String>) {
        self.args.push(value.into());
    }

    /// Appends arguments in place.
    pub fn extend_args<I, S>(&mut self, values: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(values.into_iter().map(Into::into));
    }

    /// Program to execute.
    #[must_use]
    pub fn program(&self) -> &str {
        &self.program
    }

    /// Arguments passed to the program.
    #[must_use]
    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Full argument vector including the program name.
    #[must_use]
    pub fn argv(&self) -> Vec<String> {
        let mut argv = Vec::with_capacity(self.args.len() + 1);
        argv.push(self.program.clone());
        argv.extend(self.args.iter().cloned());
        argv
    }

    /// Shell-escaped rendering used for logs and error messages.
    #[must_use]
    pub fn render(&self) -> String {
        self.argv()
            .iter()
            .map(|part| escape(part.as_str().into()).into_owned())
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn to_command(&self) -> Command {
        let mut command = Command::new(&self.program);
        command.args(&self.args);
        command
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

/// Result of running an external command.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CommandOutput {
    /// Exit code reported by the process, if available.
    pub code: Option<i32>,
    /// Captured standard output.
    pub stdout: String,
    /// Captured standard error.
    pub stderr: String,
}

impl CommandOutput {
    /// Returns `true` when the exit code equals zero.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self.code, Some(0))
    }

    /// Human readable exit status, `unknown` when the process was killed.
    #[must_use]
    pub fn status_text(&self) -> String {
        self.code
            .map_or_else(|| String::from("unknown"), |code| code.to_string())
    }
}

/// Errors raised while running or handing off to external commands.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum ProcessError {
    /// Raised when a command cannot be spawned.
    #[error("failed to spawn {program}: {message}")]
    Spawn {
        /// Command that failed to start.
        program: String,
        /// Operating system error string.
        message: String,
    },
    /// Raised when a synchronously run command exits unsuccessfully.
    #[error("{command} exited with status {status_text}{}", stderr_suffix(.stderr))]
    CommandFailure {
        /// Rendered command line.
        command: String,
        /// Exit status as reported by the OS.
        status: Option<i32>,
        /// Human readable representation of the exit status.
        status_text: String,
        /// Stderr captured from the process, empty when streamed.
        stderr: String,
    },
    /// Raised when the current process could not be replaced.
    #[error("failed to exec {program}: {message}")]
    Exec {
        /// Program that could not replace the current process.
        program: String,
        /// Operating system error string.
        message: String,
    },
}

fn stderr_suffix(stderr: &str) -> String {
    let trimmed = stderr.trim();
    if trimmed.is_empty() {
        String::new()
    } else {
        format!(": {trimmed}")
    }
}

/// Abstraction over run-to-completion execution to support fakes in tests.
pub trait CommandRunner {
    /// Runs `command` and waits for it to finish.
    ///
    /// # Errors
    ///
    /// Returns [`ProcessError::Spawn`] if the command cannot be started.
    fn run(&self, command: &CommandSpec) -> Result<CommandOutput, ProcessError>;
}

impl<R: CommandRunner + ?Sized> CommandRunner for &R {
    fn run(&self, command: &CommandSpec) -> Result<CommandOutput, ProcessError> {
        (**self).run(command)
    }
}

/// Runner that captures stdout and stderr, used for machine-readable output.
#[derive(Clone, Copy, Debug, Default)]
pub struct ProcessCommandRunner;

impl CommandRunner for ProcessCommandRunner {
    fn run(&self, command: &CommandSpec) -> Result<CommandOutput, ProcessError> {
        debug!(command = %command, "running command");
        let output = command
            .to_command()
            .output()
            .map_err(|err| ProcessError::Spawn {
                program: command.program().to_owned(),
                message: err.to_string(),
            })?;

        Ok(CommandOutput {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

/// Runner that inherits the terminal so the operator sees progress live.
#[derive(Clone, Copy, Debug, Default)]
pub struct StreamingCommandRunner;

impl CommandRunner for StreamingCommandRunner {
    fn run(&self, command: &CommandSpec) -> Result<CommandOutput, ProcessError> {
        debug!(command = %command, "running command with inherited stdio");
        let status = command
            .to_command()
            .status()
            .map_err(|err| ProcessError::Spawn {
                program: command.program().to_owned(),
                message: err.to_string(),
            })?;

        Ok(CommandOutput {
            code: status.code(),
            stdout: String::new(),
            stderr: String::new(),
        })
    }
}

/// Runs `command` to completion and fails on a non-zero exit status.
///
/// # Errors
///
/// Returns [`ProcessError::Spawn`] when the command cannot start and
/// [`ProcessError::CommandFailure`] when it exits unsuccessfully.
pub fn run_checked<R: CommandRunner + ?Sized>(
    runner: &R,
    command: &CommandSpec,
) -> Result<CommandOutput, ProcessError> {
    let output = runner.run(command)?;
    if output.is_success() {
        return Ok(output);
    }

    Err(ProcessError::CommandFailure {
        command: command.render(),
        status: output.code,
        status_text: output.status_text(),
        stderr: output.stderr,
    })
}

/// Replaces the current process image with `command`.
///
/// The new program inherits the PID, standard streams, and signal
/// disposition. On success this never returns; the returned value is the
/// reason the replacement failed.
#[must_use]
pub fn replace_process(command: &CommandSpec) -> ProcessError {
    debug!(command = %command, "replacing current process");
    exec(command)
}

#[cfg(unix)]
fn exec(command: &CommandSpec) -> ProcessError {
    use std::os::unix::process::CommandExt;

    let err = command.to_command().exec();
    ProcessError::Exec {
        program: command.program().to_owned(),
        message: err.to_string(),
    }
}

#[cfg(not(unix))]
fn exec(command: &CommandSpec) -> ProcessError {
    ProcessError::Exec {
        program: command.program().to_owned(),
        message: String::from("process replacement is only supported on Unix"),
    }
}

#[cfg(test)]
mod tests;
