//! Repository health cleaner.
//!
//! File-manager artifacts (`desktop.ini`, `Thumbs.db`, `.DS_Store`) written
//! into the metadata directory break reference resolution for every later
//! command. [`clean`] runs before anything mutates the repository and removes
//! them, together with a stale index lock.
//!
//! Every step is best effort: failures become warnings in the
//! [`CleanupReport`] and never stop the run.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use walkdir::WalkDir;

use crate::git::Git;

/// OS-generated marker files, compared case-insensitively.
pub const OS_MARKER_FILES: &[&str] = &["desktop.ini", "thumbs.db", ".ds_store"];

const PACK_EXTENSIONS: &[&str] = &[
    "pack", "idx", "rev", "bitmap", "keep", "promisor", "mtimes",
];

/// What one cleaning pass did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CleanupReport {
    /// Removed files, relative to the working-tree root.
    pub removed: Vec<PathBuf>,
    pub warnings: Vec<String>,
    pub gc_ran: bool,
}

impl CleanupReport {
    fn warn(&mut self, message: String) {
        tracing::warn!("{message}");
        self.warnings.push(message);
    }
}

pub fn is_os_marker(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    OS_MARKER_FILES.contains(&lower.as_str())
}

/// Clean the metadata directory of the repository at `git.root()`.
///
/// A working tree without metadata is left untouched.
pub fn clean(git: &Git<'_>, remote_name: &str) -> CleanupReport {
    let mut report = CleanupReport::default();
    let git_dir = git.git_dir();
    if !git_dir.is_dir() {
        return report;
    }

    let refs = git_dir.join("refs");
    remove_top_level_markers(git.root(), &refs, &mut report);
    scrub_object_store(git.root(), &git_dir.join("objects"), &mut report);
    remove_nested_markers(git.root(), &refs, &mut report);

    match git.try_run(&["gc", "--prune=now", "--quiet"]) {
        Ok(result) if !result.is_error() => report.gc_ran = true,
        Ok(result) => report.warn(format!("gc failed: {}", result.stderr.trim())),
        Err(e) => report.warn(format!("gc failed: {e}")),
    }

    let lock = git_dir.join("index.lock");
    if lock.exists() {
        remove(git.root(), &lock, &mut report);
    }

    remove_marker_tracking_refs(git, remote_name, &mut report);

    if !report.removed.is_empty() {
        tracing::info!("cleaner removed {} file(s)", report.removed.len());
    }
    report
}

fn remove(root: &Path, path: &Path, report: &mut CleanupReport) {
    match fs::remove_file(path) {
        Ok(()) => {
            let shown = path.strip_prefix(root).unwrap_or(path).to_path_buf();
            tracing::info!("removed {}", shown.display());
            report.removed.push(shown);
        }
        Err(e) => report.warn(format!("could not remove {}: {e}", path.display())),
    }
}

fn remove_top_level_markers(root: &Path, refs: &Path, report: &mut CleanupReport) {
    let Ok(entries) = fs::read_dir(refs) else {
        return;
    };
    for entry in entries.flatten() {
        let is_file = entry.file_type().map(|t| t.is_file()).unwrap_or(false);
        if is_file && is_os_marker(&entry.file_name().to_string_lossy()) {
            remove(root, &entry.path(), report);
        }
    }
}

fn remove_nested_markers(root: &Path, refs: &Path, report: &mut CleanupReport) {
    if !refs.is_dir() {
        return;
    }
    let markers: Vec<PathBuf> = WalkDir::new(refs)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file() && is_os_marker(&e.file_name().to_string_lossy()))
        .map(|e| e.into_path())
        .collect();
    for path in markers {
        remove(root, &path, report);
    }
}

fn scrub_object_store(root: &Path, objects: &Path, report: &mut CleanupReport) {
    if !objects.is_dir() {
        return;
    }
    let mut invalid = Vec::new();
    for entry in WalkDir::new(objects).min_depth(1) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                report.warn(format!("could not scan object store: {e}"));
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let Ok(relative) = entry.path().strip_prefix(objects) else {
            continue;
        };
        if !is_valid_object_entry(relative) {
            invalid.push(entry.path().to_path_buf());
        }
    }
    for path in invalid {
        remove(root, &path, report);
    }
}

/// Whether a file at `relative` (inside `objects/`) belongs in the object
/// store.
///
/// | Location | Accepted names |
/// |---|---|
/// | `info/**` | anything |
/// | top level | `commit-graph` |
/// | `<2 hex>/` | 38 or 62 hex digits |
/// | `pack/` | `pack-<40 or 64 hex>.<ext>`, `multi-pack-index*` |
///
/// OS marker files and temporary pack fragments are never valid.
pub fn is_valid_object_entry(relative: &Path) -> bool {
    let parts: Vec<String> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    let Some(name) = parts.last() else {
        return false;
    };
    if is_os_marker(name) || name.starts_with("tmp_") {
        return false;
    }

    match parts.as_slice() {
        [first, ..] if first == "info" => true,
        [single] => single == "commit-graph",
        [dir, file] if dir == "pack" => is_pack_file(file),
        [dir, file] if dir.len() == 2 && is_hex(dir) => {
            (file.len() == 38 || file.len() == 62) && is_hex(file)
        }
        _ => false,
    }
}

fn is_pack_file(name: &str) -> bool {
    if name.starts_with("multi-pack-index") {
        return true;
    }
    let Some(rest) = name.strip_prefix("pack-") else {
        return false;
    };
    let Some((hash, ext)) = rest.split_once('.') else {
        return false;
    };
    (hash.len() == 40 || hash.len() == 64) && is_hex(hash) && PACK_EXTENSIONS.contains(&ext)
}

fn is_hex(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_hexdigit())
}

fn remove_marker_tracking_refs(git: &Git<'_>, remote_name: &str, report: &mut CleanupReport) {
    let pattern = format!("refs/remotes/{remote_name}/");
    let listing = match git.probe(&["for-each-ref", "--format=%(refname)", &pattern]) {
        Ok(result) if result.exited_cleanly() => result.stdout,
        Ok(result) => {
            report.warn(format!(
                "could not list remote-tracking refs: {}",
                result.stderr.trim()
            ));
            return;
        }
        Err(e) => {
            report.warn(format!("could not list remote-tracking refs: {e}"));
            return;
        }
    };

    for refname in listing.lines().map(str::trim).filter(|r| !r.is_empty()) {
        let lower = refname.to_ascii_lowercase();
        if !OS_MARKER_FILES.iter().any(|marker| lower.contains(marker)) {
            continue;
        }
        let path = git.git_dir().join(refname);
        if path.is_file() {
            remove(git.root(), &path, report);
            continue;
        }
        match git.try_run(&["update-ref", "-d", refname]) {
            Ok(result) if !result.is_error() => {
                report.removed.push(PathBuf::from(".git").join(refname));
            }
            Ok(result) => report.warn(format!(
                "could not delete {refname}: {}",
                result.stderr.trim()
            )),
            Err(e) => report.warn(format!("could not delete {refname}: {e}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use tempfile::TempDir;
    use upsync_exec::testing::{Reply, ScriptedExecutor};

    const SHA1_REST: &str = "0123456789abcdef0123456789abcdef012345";
    const PACK_SHA1: &str = "0123456789abcdef0123456789abcdef01234567";

    #[rstest]
    #[case::loose_object(format!("ab/{SHA1_REST}"), true)]
    #[case::loose_sha256(format!("ab/{}", "f".repeat(62)), true)]
    #[case::pack(format!("pack/pack-{PACK_SHA1}.pack"), true)]
    #[case::idx(format!("pack/pack-{PACK_SHA1}.idx"), true)]
    #[case::rev(format!("pack/pack-{PACK_SHA1}.rev"), true)]
    #[case::midx("pack/multi-pack-index".to_string(), true)]
    #[case::info("info/packs".to_string(), true)]
    #[case::alternates("info/commit-graphs/commit-graph-chain".to_string(), true)]
    #[case::commit_graph("commit-graph".to_string(), true)]
    #[case::marker_in_fanout("ab/desktop.ini".to_string(), false)]
    #[case::marker_top("Thumbs.db".to_string(), false)]
    #[case::tmp_pack("pack/tmp_pack_a1b2c3".to_string(), false)]
    #[case::tmp_obj("ab/tmp_obj_XYZ".to_string(), false)]
    #[case::short_name("ab/cdef".to_string(), false)]
    #[case::non_hex(format!("ab/{}", "z".repeat(38)), false)]
    #[case::bad_fanout(format!("zz/{SHA1_REST}"), false)]
    #[case::bad_pack_ext(format!("pack/pack-{PACK_SHA1}.txt"), false)]
    #[case::stray_top("notes.txt".to_string(), false)]
    fn object_entry_validation(#[case] relative: String, #[case] valid: bool) {
        assert_eq!(is_valid_object_entry(Path::new(&relative)), valid, "{relative}");
    }

    #[test]
    fn markers_are_case_insensitive() {
        assert!(is_os_marker("Desktop.INI"));
        assert!(is_os_marker("Thumbs.db"));
        assert!(is_os_marker(".DS_Store"));
        assert!(!is_os_marker("HEAD"));
    }

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, "x").unwrap();
    }

    #[test]
    fn no_metadata_means_no_work() {
        let dir = TempDir::new().unwrap();
        let exec = ScriptedExecutor::new();
        let report = clean(&Git::new(&exec, "git", dir.path()), "origin");
        assert_eq!(report, CleanupReport::default());
        assert!(exec.calls().is_empty());
    }

    #[test]
    fn removes_corruption_and_keeps_valid_objects() {
        let dir = TempDir::new().unwrap();
        let git_dir = dir.path().join(".git");
        let valid = git_dir.join("objects/ab").join(SHA1_REST);
        touch(&valid);
        touch(&git_dir.join("objects/ab/desktop.ini"));
        touch(&git_dir.join("objects/pack/tmp_pack_123"));
        touch(&git_dir.join("refs/desktop.ini"));
        touch(&git_dir.join("refs/heads/Thumbs.db"));
        touch(&git_dir.join("refs/heads/main"));
        touch(&git_dir.join("index.lock"));

        let exec = ScriptedExecutor::new();
        let report = clean(&Git::new(&exec, "git", dir.path()), "origin");

        assert!(valid.exists());
        assert!(git_dir.join("refs/heads/main").exists());
        assert!(!git_dir.join("objects/ab/desktop.ini").exists());
        assert!(!git_dir.join("objects/pack/tmp_pack_123").exists());
        assert!(!git_dir.join("refs/desktop.ini").exists());
        assert!(!git_dir.join("refs/heads/Thumbs.db").exists());
        assert!(!git_dir.join("index.lock").exists());
        assert_eq!(report.removed.len(), 5);
        assert!(report.removed.contains(&PathBuf::from(".git/index.lock")));
        assert!(report.gc_ran);
        assert!(report.warnings.is_empty());
    }

    #[test]
    fn gc_failure_is_only_a_warning() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join(".git")).unwrap();
        touch(&dir.path().join(".git/index.lock"));
        let exec = ScriptedExecutor::new().on(&["gc"], Reply::failure(128, "fatal: bad object"));

        let report = clean(&Git::new(&exec, "git", dir.path()), "origin");
        assert!(!report.gc_ran);
        assert_eq!(report.warnings.len(), 1);
        assert!(!dir.path().join(".git/index.lock").exists(), "later steps still run");
    }

    #[test]
    fn deletes_tracking_refs_named_after_markers() {
        let dir = TempDir::new().unwrap();
        let git_dir = dir.path().join(".git");
        touch(&git_dir.join("refs/remotes/origin/main"));
        fs::create_dir_all(git_dir.join("refs/remotes/origin/desktop.ini")).unwrap();
        touch(&git_dir.join("refs/remotes/origin/desktop.ini/x"));

        let exec = ScriptedExecutor::new()
            .on(
                &["for-each-ref"],
                Reply::stdout(
                    "refs/remotes/origin/main\nrefs/remotes/origin/desktop.ini/x\nrefs/remotes/origin/packed-thumbs.db\n",
                ),
            );
        let report = clean(&Git::new(&exec, "git", dir.path()), "origin");

        assert!(git_dir.join("refs/remotes/origin/main").exists());
        assert!(!git_dir.join("refs/remotes/origin/desktop.ini/x").exists());
        assert!(exec.issued(&["update-ref", "-d", "refs/remotes/origin/packed-thumbs.db"]));
        assert!(exec.issued(&["for-each-ref", "--format=%(refname)", "refs/remotes/origin/"]));
        assert_eq!(report.removed.len(), 2);
    }
}
