//! Output classification.
//!
//! The version-control tool reports benign conditions ("nothing to commit",
//! line-ending notices) on the same stream as fatal ones, so exit codes alone
//! misfire. Every textual marker upsync reacts to is listed here and nowhere
//! else.
//!
//! | Marker | Streams | Case | Meaning |
//! |---|---|---|---|
//! | [`ERROR_MARKERS`] | stderr | insensitive | error, unless a warning marker is also present |
//! | [`WARNING_MARKERS`] | stderr | insensitive | warning |
//! | [`CONFLICT_MARKER`] | stdout + stderr | sensitive | merge stopped on a conflict |
//! | [`AUTH_FAILURE_MARKERS`] | stdout + stderr | insensitive | credentials rejected |
//! | [`NO_UPSTREAM_MARKER`] | stdout + stderr | insensitive | branch has no upstream |

use upsync_core::{Classification, CommandResult};

pub const ERROR_MARKERS: &[&str] = &["error:", "fatal:"];
pub const WARNING_MARKERS: &[&str] = &["warning:"];
pub const CONFLICT_MARKER: &str = "CONFLICT";
pub const AUTH_FAILURE_MARKERS: &[&str] = &[
    "authentication failed",
    "could not read username",
    "permission denied",
];
pub const NO_UPSTREAM_MARKER: &str = "has no upstream branch";

/// Classify a finished command.
///
/// `Error` if stderr carries an error marker without a warning marker, or the
/// exit code is non-zero; otherwise `Warning` if stderr carries a warning
/// marker; otherwise `Ok`.
pub fn classify(exit_code: i32, stderr: &str) -> Classification {
    let lower = stderr.to_lowercase();
    let has_error = contains_any(&lower, ERROR_MARKERS);
    let has_warning = contains_any(&lower, WARNING_MARKERS);

    if (has_error && !has_warning) || exit_code != 0 {
        Classification::Error
    } else if has_warning {
        Classification::Warning
    } else {
        Classification::Ok
    }
}

/// A pull or merge stopped on conflicting changes.
pub fn has_conflict(result: &CommandResult) -> bool {
    result.combined_output().contains(CONFLICT_MARKER)
}

/// The remote rejected our credentials.
pub fn is_auth_failure(result: &CommandResult) -> bool {
    contains_any(&result.combined_output().to_lowercase(), AUTH_FAILURE_MARKERS)
}

/// A push failed because the branch has no upstream configured.
pub fn lacks_upstream(result: &CommandResult) -> bool {
    result
        .combined_output()
        .to_lowercase()
        .contains(NO_UPSTREAM_MARKER)
}

fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|needle| haystack.contains(needle))
}
