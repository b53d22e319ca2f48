//! The [`Executor`] seam and its process-backed implementation.
//!
//! Implementors only provide [`Executor::run`], which produces raw output.
//! Classification, logging and the `fail_on_error` policy live in the provided
//! [`Executor::execute`] so every implementation (including test doubles)
//! behaves identically above the process boundary.

use std::path::Path;
use std::process::Command;

use upsync_core::{Classification, CommandResult};

use crate::classify::classify;
use crate::command::CommandLine;
use crate::error::ExecError;

/// Per-invocation policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecOptions {
    /// Return [`ExecError::Failed`] when the result classifies as an error.
    pub fail_on_error: bool,
    /// Suppress command / stdout logging. Errors and warnings still reach the
    /// log at debug level.
    pub silent: bool,
}

impl ExecOptions {
    /// Required step: log everything, errors are fatal.
    pub const fn checked() -> Self {
        Self {
            fail_on_error: true,
            silent: false,
        }
    }

    /// Visible step whose failure the caller inspects itself.
    pub const fn lenient() -> Self {
        Self {
            fail_on_error: false,
            silent: false,
        }
    }

    /// Probe: no logging, never fails.
    pub const fn quiet() -> Self {
        Self {
            fail_on_error: false,
            silent: true,
        }
    }
}

/// Unclassified output of a finished process.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RawOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

/// Runs commands. Blocking; one command at a time.
pub trait Executor {
    /// Run `command` in `cwd` to completion and capture its output.
    fn run(&self, command: &CommandLine, cwd: &Path) -> Result<RawOutput, ExecError>;

    /// Run, classify and log `command`.
    ///
    /// Fails with [`ExecError::Failed`] only when `options.fail_on_error` is
    /// set and the result classifies as [`Classification::Error`]; spawn
    /// failures are always returned as [`ExecError::Spawn`].
    fn execute(
        &self,
        command: &CommandLine,
        cwd: &Path,
        options: ExecOptions,
    ) -> Result<CommandResult, ExecError> {
        if !options.silent {
            tracing::info!("running: {command}");
        }

        let raw = self.run(command, cwd)?;
        let classification = classify(raw.exit_code, &raw.stderr);
        let result = CommandResult {
            exit_code: raw.exit_code,
            stdout: raw.stdout,
            stderr: raw.stderr,
            classification,
        };

        log_output(command, &result, options.silent);

        if options.fail_on_error && result.is_error() {
            return Err(ExecError::Failed {
                command: command.to_string(),
                exit_code: result.exit_code,
                stderr: result.stderr.trim().to_string(),
            });
        }
        Ok(result)
    }
}

impl<E: Executor + ?Sized> Executor for &E {
    fn run(&self, command: &CommandLine, cwd: &Path) -> Result<RawOutput, ExecError> {
        (**self).run(command, cwd)
    }
}

impl<E: Executor + ?Sized> Executor for Box<E> {
    fn run(&self, command: &CommandLine, cwd: &Path) -> Result<RawOutput, ExecError> {
        (**self).run(command, cwd)
    }
}

fn log_output(command: &CommandLine, result: &CommandResult, silent: bool) {
    let stdout = result.stdout.trim();
    let stderr = result.stderr.trim();

    if !silent && !stdout.is_empty() {
        tracing::info!("{stdout}");
    }
    if stderr.is_empty() {
        return;
    }
    match (result.classification, silent) {
        (Classification::Error, false) => tracing::error!("{stderr}"),
        (Classification::Warning, false) => tracing::warn!("{stderr}"),
        (Classification::Ok, false) => tracing::info!("{stderr}"),
        (classification, true) => tracing::debug!("{command} ({classification}): {stderr}"),
    }
}

// ---------------------------------------------------------------------------
// ProcessExecutor
// ---------------------------------------------------------------------------

/// Spawns real processes via [`std::process::Command`].
///
/// stdin is closed; stdout and stderr are captured and decoded lossily.
#[derive(Debug, Clone, Default)]
pub struct ProcessExecutor {
    envs: Vec<(String, String)>,
}

impl ProcessExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set an environment variable on every spawned process.
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.envs.push((key.into(), value.into()));
        self
    }
}

impl Executor for ProcessExecutor {
    fn run(&self, command: &CommandLine, cwd: &Path) -> Result<RawOutput, ExecError> {
        let output = Command::new(command.program())
            .args(command.arguments())
            .envs(self.envs.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .current_dir(cwd)
            .output()
            .map_err(|source| ExecError::Spawn {
                command: command.to_string(),
                source,
            })?;

        Ok(RawOutput {
            // `None` means the process was killed by a signal (e.g. Ctrl-C).
            exit_code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
