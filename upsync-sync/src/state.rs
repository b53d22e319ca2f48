//! Repository probes.
//!
//! Nothing here caches: every orchestration step may have mutated the
//! repository, so each question is asked of the tool again.

use std::path::Path;

use upsync_core::{RepositoryState, SyncConfig};

use crate::branch::resolve_branch;
use crate::error::SyncError;
use crate::git::{Git, GIT_DIR};
use crate::remote::configured_remotes;

/// `true` when `root` already has version-control metadata.
pub fn is_initialized(root: &Path) -> bool {
    root.join(GIT_DIR).exists()
}

/// `true` once the current branch has at least one commit.
pub fn has_any_commit(git: &Git<'_>) -> bool {
    match git.probe(&["rev-parse", "--verify", "-q", "HEAD"]) {
        Ok(result) => result.exited_cleanly(),
        Err(_) => false,
    }
}

/// Staged changes, unstaged changes, or untracked files not covered by the
/// ignore rules.
pub fn is_dirty(git: &Git<'_>) -> Result<bool, SyncError> {
    if !git.probe(&["diff", "--cached", "--exit-code", "--quiet"])?.exited_cleanly() {
        return Ok(true);
    }
    if !git.probe(&["diff", "--exit-code", "--quiet"])?.exited_cleanly() {
        return Ok(true);
    }
    let untracked = git.probe(&["ls-files", "--others", "--exclude-standard"])?;
    Ok(!untracked.stdout_trimmed().is_empty())
}

/// A fresh snapshot of the repository at `git.root()`.
pub fn capture(git: &Git<'_>, config: &SyncConfig) -> Result<RepositoryState, SyncError> {
    if !is_initialized(git.root()) {
        return Ok(RepositoryState::uninitialized(&config.default_branch));
    }

    let remotes = configured_remotes(git)?;
    let configured = remotes.get(&config.remote_name);
    let remote_url_matches = match (configured, config.remote_url.as_deref()) {
        (Some(current), Some(wanted)) => current == wanted.trim(),
        _ => false,
    };

    Ok(RepositoryState {
        is_initialized: true,
        current_branch: resolve_branch(git, &config.default_branch),
        has_any_commit: has_any_commit(git),
        remote_configured: configured.is_some(),
        remote_url_matches,
        is_dirty: is_dirty(git)?,
    })
}

/// Packed object store size in MiB, from `count-objects -v`.
pub fn store_size_mb(git: &Git<'_>) -> Option<u64> {
    let result = git.probe(&["count-objects", "-v"]).ok()?;
    if !result.exited_cleanly() {
        return None;
    }
    parse_size_pack(&result.stdout).map(|kib| kib / 1024)
}

/// The `size-pack` value (KiB) of `count-objects -v` output.
pub fn parse_size_pack(output: &str) -> Option<u64> {
    output
        .lines()
        .find_map(|line| line.strip_prefix("size-pack:"))
        .and_then(|value| value.trim().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use upsync_exec::testing::{Reply, ScriptedExecutor};

    #[test]
    fn parses_size_pack() {
        let out = "count: 12\nsize: 48\nin-pack: 3021\npacks: 1\nsize-pack: 614400\nprune-packable: 0\n";
        assert_eq!(parse_size_pack(out), Some(614_400));
        assert_eq!(parse_size_pack("count: 0\n"), None);
    }

    #[test]
    fn store_size_is_reported_in_mib() {
        let exec = ScriptedExecutor::new()
            .on(&["count-objects"], Reply::stdout("size-pack: 524288\n"));
        let git = Git::new(&exec, "git", Path::new("/r"));
        assert_eq!(store_size_mb(&git), Some(512));
    }

    #[test]
    fn dirty_when_anything_is_untracked() {
        let exec = ScriptedExecutor::new()
            .on(&["ls-files", "--others"], Reply::stdout("new.txt\n"));
        let git = Git::new(&exec, "git", Path::new("/r"));
        assert!(is_dirty(&git).unwrap());
    }

    #[test]
    fn dirty_when_index_differs_and_stops_probing() {
        let exec = ScriptedExecutor::new()
            .on(&["diff", "--cached"], Reply::failure(1, ""));
        let git = Git::new(&exec, "git", Path::new("/r"));
        assert!(is_dirty(&git).unwrap());
        assert_eq!(exec.calls().len(), 1);
    }

    #[test]
    fn clean_tree_is_not_dirty() {
        let exec = ScriptedExecutor::new();
        let git = Git::new(&exec, "git", Path::new("/r"));
        assert!(!is_dirty(&git).unwrap());
        assert_eq!(exec.calls().len(), 3);
    }

    #[test]
    fn uninitialized_directory_is_captured_without_commands() {
        let dir = TempDir::new().unwrap();
        let exec = ScriptedExecutor::new();
        let git = Git::new(&exec, "git", dir.path());
        let state = capture(&git, &SyncConfig::default()).unwrap();
        assert_eq!(state, RepositoryState::uninitialized("main"));
        assert!(exec.calls().is_empty());
    }

    #[test]
    fn captures_initialized_repository() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join(".git")).unwrap();
        let exec = ScriptedExecutor::new()
            .on(
                &["remote", "-v"],
                Reply::stdout("origin\thttps://example.com/r.git (fetch)\n"),
            )
            .on(&["branch", "--show-current"], Reply::stdout("dev\n"))
            .on(&["rev-parse", "--verify"], Reply::failure(1, ""));
        let git = Git::new(&exec, "git", dir.path());

        let config = SyncConfig::with_remote("https://example.com/r.git");
        let state = capture(&git, &config).unwrap();
        assert!(state.is_initialized);
        assert_eq!(state.current_branch, "dev");
        assert!(!state.has_any_commit);
        assert!(state.remote_configured);
        assert!(state.remote_url_matches);
        assert!(!state.is_dirty);
    }
}
