//! Ignore-rules file management.
//!
//! The file is created once with a default ruleset and afterwards only ever
//! appended to. Exclusions added here are never removed by upsync.

use std::collections::HashSet;
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::Path;

use upsync_core::ExclusionEntry;

use crate::error::{io_err, SyncError};

/// The default ruleset; `log_file` is this tool's own log.
pub fn default_rules(log_file: &Path) -> String {
    let log_file = log_file.to_string_lossy().replace('\\', "/");
    let sections: [(&str, &[&str]); 6] = [
        (
            "# Python",
            &[
                "__pycache__/",
                "*.py[cod]",
                "*$py.class",
                "*.so",
                ".Python",
                "build/",
                "develop-eggs/",
                "dist/",
                "downloads/",
                "eggs/",
                ".eggs/",
                "lib/",
                "lib64/",
                "parts/",
                "sdist/",
                "var/",
                "wheels/",
                "*.egg-info/",
                ".installed.cfg",
                "*.egg",
                "MANIFEST",
            ],
        ),
        (
            "# Environments",
            &[".env", ".venv", "env/", "venv/", "ENV/", "env.bak/", "venv.bak/"],
        ),
        ("# Logs", &["*.log"]),
        ("# IDE files", &[".idea/", ".vscode/", "*.swp", "*.swo"]),
        ("# OS specific", &[".DS_Store", "Thumbs.db", "desktop.ini"]),
        (
            "# Project specific",
            &[
                "backend/data/temp/",
                "backend/data/cache/",
                "node_modules/",
                "package-lock.json",
            ],
        ),
    ];

    let mut out = String::new();
    for (header, rules) in sections {
        if !out.is_empty() {
            out.push('\n');
        }
        out.push_str(header);
        out.push('\n');
        for rule in rules {
            out.push_str(rule);
            out.push('\n');
        }
        if header == "# Logs" {
            out.push_str(&log_file);
            out.push('\n');
        }
    }
    out
}

/// Create `path` with [`default_rules`] unless it already exists.
///
/// Returns `true` if the file was created. Never overwrites.
pub fn ensure_ignore_file(path: &Path, log_file: &Path) -> Result<bool, SyncError> {
    let mut file = match OpenOptions::new().write(true).create_new(true).open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::AlreadyExists => return Ok(false),
        Err(e) => return Err(io_err(path, e)),
    };
    file.write_all(default_rules(log_file).as_bytes())
        .map_err(|e| io_err(path, e))?;
    tracing::info!("created default ignore file {}", path.display());
    Ok(true)
}

/// The ignore-file line matching exactly `path` (relative, `/`-separated).
///
/// The pattern is anchored at the root so a same-named file in another
/// directory stays tracked. Glob characters and backslashes are escaped, as
/// are trailing spaces, which would otherwise be stripped.
pub fn literal_pattern(path: &str) -> String {
    let mut pattern = String::with_capacity(path.len() + 1);
    pattern.push('/');
    for c in path.chars() {
        if matches!(c, '[' | ']' | '*' | '?' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    let body = pattern.trim_end_matches(' ');
    let trailing = pattern.len() - body.len();
    let mut escaped = body.to_string();
    for _ in 0..trailing {
        escaped.push_str("\\ ");
    }
    escaped
}

/// Append each entry as one anchored literal line (see [`literal_pattern`]),
/// skipping entries the file already lists. Returns the entries actually
/// written.
pub fn append_entries(
    path: &Path,
    entries: &[ExclusionEntry],
) -> Result<Vec<ExclusionEntry>, SyncError> {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == ErrorKind::NotFound => String::new(),
        Err(e) => return Err(io_err(path, e)),
    };
    let existing: HashSet<&str> = contents
        .lines()
        .map(|line| line.trim_end_matches('\r'))
        .collect();

    let mut seen = HashSet::new();
    let mut fresh = Vec::new();
    let mut buf = String::new();
    for entry in entries {
        let pattern = literal_pattern(entry.as_str());
        // An unanchored line from an earlier run still excludes the file.
        if existing.contains(pattern.as_str()) || existing.contains(&pattern[1..]) {
            continue;
        }
        if !seen.insert(pattern.clone()) {
            continue;
        }
        buf.push_str(&pattern);
        buf.push('\n');
        fresh.push(entry.clone());
    }
    if fresh.is_empty() {
        return Ok(fresh);
    }
    if !contents.is_empty() && !contents.ends_with('\n') {
        buf.insert(0, '\n');
    }

    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| io_err(path, e))?;
    file.write_all(buf.as_bytes()).map_err(|e| io_err(path, e))?;
    Ok(fresh)
}
