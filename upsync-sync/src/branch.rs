//! Active branch resolution.
//!
//! Fallback chain, fastest signal first:
//!
//! 1. `branch --show-current` — the checked-out branch (also names an unborn
//!    branch in a fresh repository)
//! 2. `rev-parse --abbrev-ref HEAD` — unless it answers the literal `HEAD`
//!    (detached head)
//! 3. the configured default

use crate::git::Git;

/// What `rev-parse --abbrev-ref HEAD` prints for a detached head.
pub const DETACHED_HEAD: &str = "HEAD";

/// Resolve the branch to sync. Never fails.
pub fn resolve_branch(git: &Git<'_>, default_branch: &str) -> String {
    if let Some(branch) = query(git, &["branch", "--show-current"]) {
        return branch;
    }
    if let Some(branch) = query(git, &["rev-parse", "--abbrev-ref", "HEAD"]) {
        if branch != DETACHED_HEAD {
            return branch;
        }
    }
    tracing::debug!("no branch resolvable, falling back to '{default_branch}'");
    default_branch.to_string()
}

fn query(git: &Git<'_>, args: &[&str]) -> Option<String> {
    let result = git.probe(args).ok()?;
    if !result.exited_cleanly() {
        return None;
    }
    let name = result.stdout_trimmed();
    (!name.is_empty()).then(|| name.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::path::Path;
    use upsync_exec::testing::{Reply, ScriptedExecutor};

    fn resolve(exec: &ScriptedExecutor) -> String {
        resolve_branch(&Git::new(exec, "git", Path::new("/r")), "main")
    }

    #[test]
    fn checked_out_branch_wins() {
        let exec = ScriptedExecutor::new()
            .on(&["branch", "--show-current"], Reply::stdout("feature-x\n"));
        assert_eq!(resolve(&exec), "feature-x");
        assert!(!exec.issued(&["rev-parse"]), "fallback must not run");
    }

    #[test]
    fn falls_back_to_abbrev_ref() {
        let exec = ScriptedExecutor::new()
            .on(&["branch", "--show-current"], Reply::stdout(""))
            .on(&["rev-parse", "--abbrev-ref"], Reply::stdout("develop\n"));
        assert_eq!(resolve(&exec), "develop");
    }

    #[rstest]
    #[case::detached(Reply::stdout(""), Reply::stdout("HEAD\n"))]
    #[case::unborn_old_git(
        Reply::failure(129, "error: unknown option `show-current'"),
        Reply::failure(128, "fatal: ambiguous argument 'HEAD'")
    )]
    #[case::tool_missing(Reply::not_found(), Reply::not_found())]
    fn ambiguous_heads_use_default(#[case] show_current: Reply, #[case] abbrev: Reply) {
        let exec = ScriptedExecutor::new()
            .on(&["branch", "--show-current"], show_current)
            .on(&["rev-parse", "--abbrev-ref"], abbrev);
        assert_eq!(resolve(&exec), "main");
    }
}
