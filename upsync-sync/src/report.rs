//! Post-sync summary of ignored paths. Read-only; never affects the outcome.

use serde::Serialize;

use crate::error::SyncError;
use crate::git::Git;

/// Up to this many paths are listed in full.
pub const FULL_LISTING_LIMIT: usize = 5;
/// Paths listed before the "... and N more" line of a longer report.
pub const PREVIEW_LEN: usize = 3;

/// Paths currently excluded by the ignore rules.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IgnoredReport {
    pub paths: Vec<String>,
}

impl IgnoredReport {
    /// Parse `status --ignored --porcelain -z` output: NUL-terminated
    /// records with paths verbatim, no quoting or escapes.
    pub fn parse(porcelain: &str) -> Self {
        let mut paths = Vec::new();
        let mut records = porcelain.split('\0');
        while let Some(record) = records.next() {
            if let Some(path) = record.strip_prefix("!! ") {
                if !path.is_empty() {
                    paths.push(path.to_string());
                }
                continue;
            }
            // Renames and copies carry the original path as an extra record.
            let status = record.get(..2).unwrap_or_default();
            if status.contains(|c: char| c == 'R' || c == 'C') {
                records.next();
            }
        }
        Self { paths }
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// The capped display listing.
    pub fn summary_lines(&self) -> Vec<String> {
        if self.paths.len() <= FULL_LISTING_LIMIT {
            return self.paths.clone();
        }
        let mut lines: Vec<String> = self.paths[..PREVIEW_LEN].to_vec();
        lines.push(format!("... and {} more", self.paths.len() - PREVIEW_LEN));
        lines
    }
}

pub fn ignored_report(git: &Git<'_>) -> Result<IgnoredReport, SyncError> {
    let result = git.probe(&["status", "--ignored", "--porcelain", "-z"])?;
    Ok(IgnoredReport::parse(&result.stdout))
}

/// Log the ignored-path summary. Failures are logged at debug and dropped.
pub fn report_ignored(git: &Git<'_>) {
    let report = match ignored_report(git) {
        Ok(report) => report,
        Err(e) => {
            tracing::debug!("ignored-path report unavailable: {e}");
            return;
        }
    };
    if report.is_empty() {
        tracing::info!("no paths are ignored");
        return;
    }
    tracing::info!("{} ignored path(s):", report.len());
    for line in report.summary_lines() {
        tracing::info!("  {line}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use upsync_exec::testing::{Reply, ScriptedExecutor};

    #[test]
    fn parses_only_ignored_entries() {
        let report = IgnoredReport::parse("?? new.txt\0!! target/\0 M src/lib.rs\0!! my file.bin\0");
        assert_eq!(report.paths, vec!["target/", "my file.bin"]);
    }

    #[test]
    fn paths_are_taken_verbatim() {
        let report = IgnoredReport::parse("!! caf\u{e9}.log\0!! say \"hi\".log\0!! tab\there.log\0");
        assert_eq!(
            report.paths,
            vec!["caf\u{e9}.log", "say \"hi\".log", "tab\there.log"]
        );
    }

    #[test]
    fn rename_source_is_not_mistaken_for_an_entry() {
        let report = IgnoredReport::parse("R  new.txt\0!! odd-old-name\0!! build/\0");
        assert_eq!(report.paths, vec!["build/"]);
    }

    #[test]
    fn small_reports_list_everything() {
        let report = IgnoredReport {
            paths: (1..=5).map(|i| format!("p{i}")).collect(),
        };
        assert_eq!(report.summary_lines(), report.paths);
    }

    #[test]
    fn large_reports_are_capped() {
        let report = IgnoredReport {
            paths: (1..=9).map(|i| format!("p{i}")).collect(),
        };
        assert_eq!(
            report.summary_lines(),
            vec!["p1", "p2", "p3", "... and 6 more"]
        );
    }

    #[test]
    fn reporting_never_fails() {
        let exec = ScriptedExecutor::new().on(&["status"], Reply::not_found());
        report_ignored(&Git::new(&exec, "git", Path::new("/r")));
        assert_eq!(exec.count(&["status", "--ignored"]), 1);
    }
}
