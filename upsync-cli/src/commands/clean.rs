//! `upsync clean [PATH]` — run only the repository health cleaner.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use colored::Colorize;

use upsync_exec::ProcessExecutor;
use upsync_sync::{cleaner, Git};

use super::{load_config, resolve_root};
use crate::logging;

/// Arguments for `upsync clean`.
#[derive(Args, Debug)]
pub struct CleanArgs {
    /// Working tree whose metadata should be cleaned.
    #[arg(default_value = ".")]
    pub path: PathBuf,

    /// Config file to use instead of the layered lookup.
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,
}

impl CleanArgs {
    pub fn run(self) -> Result<()> {
        let root = resolve_root(&self.path)?;
        let config = load_config(&root, self.config.as_deref())?;
        logging::init(Some(&config.log_file_path(&root)))?;

        let executor = ProcessExecutor::new();
        let git = Git::new(&executor, &config.git_program, &root);
        if !git.git_dir().is_dir() {
            println!("{} is not a repository; nothing to clean", root.display());
            return Ok(());
        }

        let report = cleaner::clean(&git, &config.remote_name);
        if report.removed.is_empty() {
            println!("✓ metadata is clean");
        } else {
            println!("✓ removed {} file(s):", report.removed.len());
            for path in &report.removed {
                println!("  ✗  {}", path.display());
            }
        }
        for warning in &report.warnings {
            println!("  {}  {warning}", "!".yellow().bold());
        }
        Ok(())
    }
}
