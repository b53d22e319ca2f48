//! Remote configuration and remote-side queries.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::error::SyncError;
use crate::git::Git;

/// What [`ensure_remote`] did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "change", rename_all = "snake_case")]
pub enum RemoteChange {
    Added,
    /// The URL was rewritten in place.
    Updated { previous: String },
    Unchanged,
}

/// Remote name → fetch URL, parsed from `remote -v`.
pub fn configured_remotes(git: &Git<'_>) -> Result<BTreeMap<String, String>, SyncError> {
    let result = git.probe(&["remote", "-v"])?;
    Ok(parse_remotes(&result.stdout))
}

fn parse_remotes(output: &str) -> BTreeMap<String, String> {
    let mut remotes = BTreeMap::new();
    for line in output.lines() {
        let mut fields = line.split_whitespace();
        let (Some(name), Some(url)) = (fields.next(), fields.next()) else {
            continue;
        };
        if fields.next() == Some("(push)") && remotes.contains_key(name) {
            continue;
        }
        remotes.insert(name.to_string(), url.to_string());
    }
    remotes
}

/// Make `name` point at `url`.
///
/// A missing remote is added; a remote with a different URL is updated in
/// place with `remote set-url`, so there is never a moment with no remote.
pub fn ensure_remote(git: &Git<'_>, name: &str, url: &str) -> Result<RemoteChange, SyncError> {
    let remotes = configured_remotes(git)?;
    match remotes.get(name) {
        None => {
            git.run(&["remote", "add", name, url])?;
            tracing::info!("added remote '{name}' → {url}");
            Ok(RemoteChange::Added)
        }
        Some(current) if current == url => Ok(RemoteChange::Unchanged),
        Some(current) => {
            let previous = current.clone();
            git.run(&["remote", "set-url", name, url])?;
            tracing::info!("updated remote '{name}': {previous} → {url}");
            Ok(RemoteChange::Updated { previous })
        }
    }
}

/// `true` when `url` answers `ls-remote`.
pub fn probe_remote(git: &Git<'_>, url: &str) -> bool {
    match git.probe(&["ls-remote", url]) {
        Ok(result) => result.exited_cleanly(),
        Err(_) => false,
    }
}

/// Apply repository-level settings. Best effort: a failed setting is logged
/// and skipped. Re-applying is always safe.
pub fn apply_settings(git: &Git<'_>, settings: &BTreeMap<String, String>) {
    for (key, value) in settings {
        match git.try_run(&["config", key, value]) {
            Ok(result) if !result.is_error() => {}
            Ok(result) => tracing::warn!(
                "could not set {key}={value}: {}",
                result.stderr.trim()
            ),
            Err(e) => tracing::warn!("could not set {key}={value}: {e}"),
        }
    }
}

/// `true` when `branch` exists on `remote`.
pub fn remote_branch_exists(git: &Git<'_>, remote: &str, branch: &str) -> bool {
    match git.probe(&["ls-remote", "--heads", remote, branch]) {
        Ok(result) => result.exited_cleanly() && !result.stdout_trimmed().is_empty(),
        Err(_) => false,
    }
}

/// Branch names on `remote`, after a pruning fetch.
///
/// A failed fetch is logged; the locally known remote-tracking branches are
/// listed regardless.
pub fn list_remote_branches(git: &Git<'_>, remote: &str) -> Result<Vec<String>, SyncError> {
    let fetch = git.try_run(&["fetch", "--prune", remote])?;
    if fetch.is_error() {
        tracing::warn!("fetch from '{remote}' failed; remote branches may be stale");
    }
    let listing = git.probe(&["branch", "-r"])?;
    Ok(parse_remote_branches(&listing.stdout, remote))
}

fn parse_remote_branches(output: &str, remote: &str) -> Vec<String> {
    let prefix = format!("{remote}/");
    output
        .lines()
        .map(str::trim)
        .filter(|line| !line.contains(" -> "))
        .filter_map(|line| line.strip_prefix(&prefix))
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use upsync_exec::testing::{Reply, ScriptedExecutor};

    const REMOTE_V: &str = "origin\thttps://example.com/a.git (fetch)\n\
                            origin\thttps://example.com/a.git (push)\n\
                            backup\t/srv/backup.git (fetch)\n\
                            backup\t/srv/backup.git (push)\n";

    fn git(exec: &ScriptedExecutor) -> Git<'_> {
        Git::new(exec, "git", Path::new("/r"))
    }

    #[test]
    fn parses_remote_listing() {
        let remotes = parse_remotes(REMOTE_V);
        assert_eq!(remotes.len(), 2);
        assert_eq!(remotes["origin"], "https://example.com/a.git");
        assert_eq!(remotes["backup"], "/srv/backup.git");
    }

    #[test]
    fn adds_missing_remote() {
        let exec = ScriptedExecutor::new().on(&["remote", "-v"], Reply::stdout(""));
        let change = ensure_remote(&git(&exec), "origin", "https://x/y.git").unwrap();
        assert_eq!(change, RemoteChange::Added);
        assert!(exec.issued(&["remote", "add", "origin", "https://x/y.git"]));
    }

    #[test]
    fn rewrites_drifted_url_in_place() {
        let exec = ScriptedExecutor::new().on(&["remote", "-v"], Reply::stdout(REMOTE_V));
        let change = ensure_remote(&git(&exec), "origin", "https://new/url.git").unwrap();
        assert_eq!(
            change,
            RemoteChange::Updated {
                previous: "https://example.com/a.git".into()
            }
        );
        assert!(exec.issued(&["remote", "set-url", "origin", "https://new/url.git"]));
        assert!(!exec.issued(&["remote", "remove"]));
        assert!(!exec.issued(&["remote", "add"]));
    }

    #[test]
    fn matching_remote_is_left_alone() {
        let exec = ScriptedExecutor::new().on(&["remote", "-v"], Reply::stdout(REMOTE_V));
        let change = ensure_remote(&git(&exec), "origin", "https://example.com/a.git").unwrap();
        assert_eq!(change, RemoteChange::Unchanged);
        assert_eq!(exec.calls().len(), 1);
    }

    #[test]
    fn settings_failures_do_not_stop_the_rest() {
        let exec = ScriptedExecutor::new()
            .on(&["config", "core.autocrlf"], Reply::failure(4, "error: could not lock config file"));
        let settings: BTreeMap<String, String> = [
            ("core.autocrlf".to_string(), "true".to_string()),
            ("diff.renames".to_string(), "true".to_string()),
        ]
        .into_iter()
        .collect();
        apply_settings(&git(&exec), &settings);
        assert!(exec.issued(&["config", "diff.renames", "true"]));
    }

    #[test]
    fn remote_branch_exists_needs_output() {
        let exec = ScriptedExecutor::new()
            .once(&["ls-remote", "--heads"], Reply::stdout(""))
            .once(
                &["ls-remote", "--heads"],
                Reply::stdout("abc123\trefs/heads/main\n"),
            );
        assert!(!remote_branch_exists(&git(&exec), "origin", "main"));
        assert!(remote_branch_exists(&git(&exec), "origin", "main"));
    }

    #[test]
    fn probe_remote_reports_exit_status() {
        let exec = ScriptedExecutor::new()
            .once(&["ls-remote"], Reply::failure(128, "fatal: repository not found"))
            .on(&["ls-remote"], Reply::success());
        assert!(!probe_remote(&git(&exec), "https://x/missing.git"));
        assert!(probe_remote(&git(&exec), "https://x/there.git"));
    }

    #[test]
    fn lists_remote_branches_without_head_alias() {
        let exec = ScriptedExecutor::new().on(
            &["branch", "-r"],
            Reply::stdout("  origin/HEAD -> origin/main\n  origin/main\n  origin/feature/x\n  backup/main\n"),
        );
        let branches = list_remote_branches(&git(&exec), "origin").unwrap();
        assert_eq!(branches, vec!["main", "feature/x"]);
        assert_eq!(exec.position(&["fetch", "--prune"]), Some(0));
    }
}
