//! Log setup: console plus an append-mode log file.
//!
//! The file is rotated before it is opened once it reaches 10 MiB, keeping at
//! most 5 backups:
//!   sync_log.txt → sync_log.txt.1 → … → sync_log.txt.5

use std::fs::{self, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Maximum log file size before rotation (10 MiB).
pub const MAX_LOG_BYTES: u64 = 10 * 1024 * 1024;

/// Maximum number of rotated backup files to keep.
pub const MAX_ROTATED_FILES: usize = 5;

/// Install the global subscriber. `RUST_LOG` overrides the `info` default.
///
/// With `log_file`, every event is also appended to that file (no ANSI).
/// Records emitted through the `log` facade by the library crates are bridged
/// in by `try_init`.
pub fn init(log_file: Option<&Path>) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let console = fmt::layer().with_target(false).with_writer(io::stderr);

    let mut rotated = false;
    let file_layer = match log_file {
        Some(path) => {
            rotated = rotate_if_needed(path, MAX_LOG_BYTES, MAX_ROTATED_FILES)
                .with_context(|| format!("failed to rotate {}", path.display()))?;
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("failed to open log file {}", path.display()))?;
            Some(
                fmt::layer()
                    .with_target(false)
                    .with_ansi(false)
                    .with_writer(Mutex::new(file)),
            )
        }
        None => None,
    };

    // A second init in the same process keeps the first subscriber.
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(console)
        .with(file_layer)
        .try_init();

    if let (true, Some(path)) = (rotated, log_file) {
        tracing::info!(path = %path.display(), "log file rotated");
    }
    Ok(())
}

/// Rotate `log_path` if its size reached `max_bytes`.
///
/// Rotation sequence (oldest first):
///   `<name>.<max_files>` deleted
///   `<name>.<n>` → `<name>.<n+1>` for n = max_files-1 … 1
///   `<name>` → `<name>.1`
///
/// Returns `true` if rotation occurred. A missing file is not an error.
pub fn rotate_if_needed(log_path: &Path, max_bytes: u64, max_files: usize) -> io::Result<bool> {
    let size = match fs::metadata(log_path) {
        Ok(meta) => meta.len(),
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(false),
        Err(err) => return Err(err),
    };
    if size < max_bytes {
        return Ok(false);
    }

    let oldest = numbered_path(log_path, max_files);
    if oldest.exists() {
        fs::remove_file(&oldest)?;
    }
    for n in (1..max_files).rev() {
        let src = numbered_path(log_path, n);
        if src.exists() {
            fs::rename(&src, numbered_path(log_path, n + 1))?;
        }
    }
    fs::rename(log_path, numbered_path(log_path, 1))?;
    Ok(true)
}

/// `sync_log.txt` → `sync_log.txt.<n>`
fn numbered_path(base: &Path, n: usize) -> PathBuf {
    let name = base
        .file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "sync_log.txt".to_string());
    base.with_file_name(format!("{name}.{n}"))
}

// ─── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn small_or_missing_files_are_left_alone() {
        let dir = TempDir::new().unwrap();
        let log = dir.path().join("sync_log.txt");
        assert!(!rotate_if_needed(&log, 16, MAX_ROTATED_FILES).unwrap());

        fs::write(&log, "short").unwrap();
        assert!(!rotate_if_needed(&log, 16, MAX_ROTATED_FILES).unwrap());
        assert!(!numbered_path(&log, 1).exists());
    }

    #[test]
    fn oversized_file_moves_to_first_backup() {
        let dir = TempDir::new().unwrap();
        let log = dir.path().join("sync_log.txt");
        fs::write(&log, "x".repeat(32)).unwrap();

        assert!(rotate_if_needed(&log, 16, MAX_ROTATED_FILES).unwrap());
        assert!(!log.exists());
        assert_eq!(fs::read_to_string(numbered_path(&log, 1)).unwrap().len(), 32);
    }

    #[test]
    fn backups_are_capped() {
        let dir = TempDir::new().unwrap();
        let log = dir.path().join("sync_log.txt");
        for n in 1..=MAX_ROTATED_FILES {
            fs::write(numbered_path(&log, n), format!("rotated-{n}")).unwrap();
        }
        fs::write(&log, "x".repeat(32)).unwrap();

        assert!(rotate_if_needed(&log, 16, MAX_ROTATED_FILES).unwrap());
        assert_eq!(
            fs::read_to_string(numbered_path(&log, MAX_ROTATED_FILES)).unwrap(),
            format!("rotated-{}", MAX_ROTATED_FILES - 1)
        );
        assert!(!numbered_path(&log, MAX_ROTATED_FILES + 1).exists());
    }

    #[test]
    fn numbered_path_appends_suffix() {
        assert_eq!(
            numbered_path(Path::new("/r/sync_log.txt"), 3),
            PathBuf::from("/r/sync_log.txt.3")
        );
    }
}
