//! Domain types shared by the executor, the orchestrator and the CLI.
//!
//! Everything here is transient: values are produced during a single run and
//! dropped at its end. Durable state lives in the repository metadata and the
//! ignore-rules file on disk.

use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// A path, relative to the repository root and `/`-separated, appended to the
/// ignore-rules file by the large-file guard.
///
/// Entries are append-only: nothing in upsync ever removes one.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ExclusionEntry(pub String);

impl ExclusionEntry {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ExclusionEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for ExclusionEntry {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ExclusionEntry {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

// ---------------------------------------------------------------------------
// Command results
// ---------------------------------------------------------------------------

/// How a finished external command should be treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Classification {
    #[default]
    Ok,
    Warning,
    Error,
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Classification::Ok => write!(f, "ok"),
            Classification::Warning => write!(f, "warning"),
            Classification::Error => write!(f, "error"),
        }
    }
}

/// Captured output of one external command.
///
/// Owned by whoever issued the command; never shared or mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommandResult {
    /// Process exit code; `-1` when the process was terminated by a signal.
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    pub classification: Classification,
}

impl CommandResult {
    /// `true` when the process exited with status zero.
    pub fn exited_cleanly(&self) -> bool {
        self.exit_code == 0
    }

    pub fn is_error(&self) -> bool {
        self.classification == Classification::Error
    }

    /// Trimmed stdout, the form most probes want.
    pub fn stdout_trimmed(&self) -> &str {
        self.stdout.trim()
    }

    /// stdout followed by stderr; some tools report the same condition on
    /// either stream.
    pub fn combined_output(&self) -> String {
        format!("{}{}", self.stdout, self.stderr)
    }
}

// ---------------------------------------------------------------------------
// Repository snapshot
// ---------------------------------------------------------------------------

/// A point-in-time view of the working tree and its metadata.
///
/// Never cached: every orchestration step may have mutated the repository, so
/// callers capture a fresh snapshot each time they need one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RepositoryState {
    pub is_initialized: bool,
    pub current_branch: String,
    pub has_any_commit: bool,
    pub remote_configured: bool,
    pub remote_url_matches: bool,
    pub is_dirty: bool,
}

impl RepositoryState {
    /// The snapshot of a directory that is not yet under version control.
    pub fn uninitialized(default_branch: &str) -> Self {
        Self {
            is_initialized: false,
            current_branch: default_branch.to_owned(),
            has_any_commit: false,
            remote_configured: false,
            remote_url_matches: false,
            is_dirty: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn result(exit_code: i32, stdout: &str, stderr: &str) -> CommandResult {
        CommandResult {
            exit_code,
            stdout: stdout.to_string(),
            stderr: stderr.to_string(),
            classification: Classification::Ok,
        }
    }

    #[test]
    fn exclusion_entry_display() {
        assert_eq!(ExclusionEntry::from("data/big.bin").to_string(), "data/big.bin");
        assert_eq!(
            ExclusionEntry::from(String::from("a")),
            ExclusionEntry::from("a")
        );
    }

    #[test]
    fn classification_display_and_default() {
        assert_eq!(Classification::Warning.to_string(), "warning");
        assert_eq!(Classification::default(), Classification::Ok);
    }

    #[test]
    fn combined_output_joins_streams_in_order() {
        let r = result(1, "CONFLICT (content)\n", "Automatic merge failed\n");
        assert_eq!(
            r.combined_output(),
            "CONFLICT (content)\nAutomatic merge failed\n"
        );
        assert!(!r.exited_cleanly());
    }

    #[test]
    fn stdout_trimmed_strips_newlines() {
        assert_eq!(result(0, "  main\n", "").stdout_trimmed(), "main");
    }

    #[test]
    fn uninitialized_snapshot_uses_default_branch() {
        let state = RepositoryState::uninitialized("main");
        assert!(!state.is_initialized);
        assert_eq!(state.current_branch, "main");
        assert!(!state.is_dirty);
    }
}
