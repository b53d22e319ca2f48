//! `upsync init [PATH] --remote-url <URL> [--force]`

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use upsync_core::{config, SyncConfig};

use super::resolve_root;

/// Write `<PATH>/upsync.yaml`.
#[derive(Args, Debug)]
pub struct InitArgs {
    /// Working tree the config belongs to.
    #[arg(default_value = ".")]
    pub path: PathBuf,

    /// URL of the remote repository.
    #[arg(long, value_name = "URL")]
    pub remote_url: String,

    /// Name of the remote.
    #[arg(long, value_name = "NAME")]
    pub remote_name: Option<String>,

    /// Branch used when none is checked out.
    #[arg(long, value_name = "NAME")]
    pub branch: Option<String>,

    /// Replace an existing upsync.yaml.
    #[arg(long)]
    pub force: bool,
}

impl InitArgs {
    pub fn run(self) -> Result<()> {
        let root = resolve_root(&self.path)?;

        let mut config = SyncConfig::with_remote(self.remote_url);
        if let Some(name) = self.remote_name {
            config.remote_name = name;
        }
        if let Some(branch) = self.branch {
            config.default_branch = branch;
        }
        config.validate().context("refusing to write an invalid config")?;

        let path = config::save_at(&root, &config, self.force)
            .with_context(|| format!("failed to write config in {}", root.display()))?;

        println!("✓ Wrote {}", path.display());
        println!("  Run `upsync sync {}` to publish.", root.display());
        Ok(())
    }
}
