//! Error types for upsync-sync.

use std::path::PathBuf;

use thiserror::Error;

use upsync_core::ConfigError;
use upsync_exec::ExecError;

/// Every way a sync run can end without success.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The version-control executable could not be run.
    #[error("`{program}` is not installed or not on PATH")]
    ToolingMissing { program: String },

    /// The network probe got no answer.
    #[error("cannot reach {host}; check the network connection")]
    NetworkUnreachable { host: String },

    /// The remote endpoint did not answer before it was first registered.
    #[error("remote {url} does not exist or is not accessible")]
    RemoteUnreachable { url: String },

    /// The remote rejected our credentials.
    #[error("authentication to remote '{remote}' failed")]
    AuthenticationFailure { remote: String },

    /// Pulling stopped on conflicting changes; the merge was aborted.
    #[error("merge conflicts pulling '{branch}'; resolve them manually before syncing")]
    MergeConflict { branch: String },

    /// A required command failed and no fallback applied.
    #[error("`{command}` failed: {detail}")]
    CommandFailure { command: String, detail: String },

    /// An I/O error, with annotated path for context.
    #[error("I/O error at {path}: {source}")]
    Filesystem {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// A defect caught at the top of the orchestrator.
    #[error("unexpected error: {0}")]
    Internal(String),
}

impl SyncError {
    /// Stable snake_case key, used in JSON output.
    pub fn kind(&self) -> &'static str {
        match self {
            SyncError::ToolingMissing { .. } => "tooling_missing",
            SyncError::NetworkUnreachable { .. } => "network_unreachable",
            SyncError::RemoteUnreachable { .. } => "remote_unreachable",
            SyncError::AuthenticationFailure { .. } => "authentication_failure",
            SyncError::MergeConflict { .. } => "merge_conflict",
            SyncError::CommandFailure { .. } => "command_failure",
            SyncError::Filesystem { .. } => "filesystem_error",
            SyncError::Config(_) => "config_error",
            SyncError::Internal(_) => "internal_error",
        }
    }
}

impl From<ExecError> for SyncError {
    fn from(err: ExecError) -> Self {
        match err {
            ExecError::Spawn { command, source } => SyncError::CommandFailure {
                command,
                detail: source.to_string(),
            },
            ExecError::Failed {
                command,
                exit_code,
                stderr,
            } => SyncError::CommandFailure {
                command,
                detail: format!("exit code {exit_code}: {stderr}"),
            },
        }
    }
}

/// Convenience constructor for [`SyncError::Filesystem`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> SyncError {
    SyncError::Filesystem {
        path: path.into(),
        source,
    }
}
