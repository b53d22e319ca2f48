//! Error types for upsync-exec.

use thiserror::Error;

/// Errors raised while running an external command.
#[derive(Debug, Error)]
pub enum ExecError {
    /// The process could not be started at all (missing executable, bad cwd).
    #[error("failed to run `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// The command ran and was classified as an error while the caller asked
    /// for errors to be fatal.
    #[error("`{command}` failed (exit code {exit_code}): {stderr}")]
    Failed {
        command: String,
        exit_code: i32,
        stderr: String,
    },
}
