//! Large-file guard.
//!
//! Runs before bulk staging so oversized files never enter the index in the
//! common case. Files staged by an earlier run are unstaged again here.

use std::path::{Component, Path};

use walkdir::WalkDir;

use upsync_core::config::BYTES_PER_MB;
use upsync_core::ExclusionEntry;

use crate::error::SyncError;
use crate::git::{Git, GIT_DIR};
use crate::ignore_file::append_entries;
use crate::state::has_any_commit;

/// A file strictly larger than the threshold.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OversizedFile {
    pub entry: ExclusionEntry,
    pub size: u64,
}

/// Exclude every file under `git.root()` larger than `limit` bytes.
///
/// Each oversized path is appended to `ignore_path` (once) and unstaged if it
/// is currently staged. Returns the entries newly added to the ignore file.
pub fn scan_and_exclude(
    git: &Git<'_>,
    ignore_path: &Path,
    limit: u64,
) -> Result<Vec<ExclusionEntry>, SyncError> {
    let oversized = find_oversized(git.root(), limit);
    if oversized.is_empty() {
        return Ok(Vec::new());
    }

    for file in &oversized {
        tracing::warn!(
            "excluding {} ({:.1} MB > {:.1} MB)",
            file.entry,
            file.size as f64 / BYTES_PER_MB as f64,
            limit as f64 / BYTES_PER_MB as f64
        );
    }

    let entries: Vec<ExclusionEntry> = oversized.iter().map(|f| f.entry.clone()).collect();
    let added = append_entries(ignore_path, &entries)?;
    if !added.is_empty() {
        tracing::info!(
            "added {} path(s) to {}",
            added.len(),
            ignore_path.display()
        );
    }

    let committed = has_any_commit(git);
    for entry in &entries {
        unstage_if_staged(git, entry, committed);
    }
    Ok(added)
}

/// Files under `root` (excluding version-control metadata) larger than
/// `limit` bytes, sorted by path. Unreadable entries are skipped.
pub fn find_oversized(root: &Path, limit: u64) -> Vec<OversizedFile> {
    let walker = WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| entry.file_name() != GIT_DIR);

    let mut found = Vec::new();
    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!("skipping unreadable path: {e}");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let size = match entry.metadata() {
            Ok(meta) => meta.len(),
            Err(e) => {
                tracing::warn!("skipping {}: {e}", entry.path().display());
                continue;
            }
        };
        if size <= limit {
            continue;
        }
        if let Some(relative) = relative_slash_path(root, entry.path()) {
            found.push(OversizedFile {
                entry: ExclusionEntry::from(relative),
                size,
            });
        }
    }
    found
}

fn unstage_if_staged(git: &Git<'_>, entry: &ExclusionEntry, committed: bool) {
    let path = entry.as_str();
    let pathspec = format!(":(literal){path}");
    let staged = match git.probe(&["diff", "--cached", "--name-only", "--", &pathspec]) {
        Ok(result) => !result.stdout_trimmed().is_empty(),
        Err(_) => false,
    };
    if !staged {
        return;
    }

    let result = if committed {
        git.try_run(&["reset", "-q", "HEAD", "--", &pathspec])
    } else {
        git.try_run(&["rm", "--cached", "-q", "--ignore-unmatch", "--", &pathspec])
    };
    match result {
        Ok(r) if !r.is_error() => tracing::info!("unstaged {path}"),
        Ok(r) => tracing::warn!("could not unstage {path}: {}", r.stderr.trim()),
        Err(e) => tracing::warn!("could not unstage {path}: {e}"),
    }
}

/// `path` relative to `root`, `/`-separated. `None` outside `root` or for
/// `root` itself.
pub fn relative_slash_path(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    let parts: Vec<String> = relative
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect();
    (!parts.is_empty()).then(|| parts.join("/"))
}
