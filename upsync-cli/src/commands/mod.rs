pub mod clean;
pub mod init;
pub mod logs;
pub mod status;
pub mod sync;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use upsync_core::{config, SyncConfig};

/// Canonical form of a working-tree argument.
pub(crate) fn resolve_root(path: &Path) -> Result<PathBuf> {
    path.canonicalize()
        .with_context(|| format!("cannot resolve path '{}'", path.display()))
}

/// `--config <file>` when given, otherwise the layered lookup for `root`.
pub(crate) fn load_config(root: &Path, explicit: Option<&Path>) -> Result<SyncConfig> {
    match explicit {
        Some(file) => config::load_file(file)
            .with_context(|| format!("failed to load config {}", file.display())),
        None => config::load(root)
            .with_context(|| format!("failed to load config for {}", root.display())),
    }
}
