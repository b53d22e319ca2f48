//! `upsync logs [PATH] [--lines N]`

use std::collections::VecDeque;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;

use super::{load_config, resolve_root};

/// Arguments for `upsync logs`.
#[derive(Args, Debug)]
pub struct LogsArgs {
    /// Working tree whose log to show.
    #[arg(default_value = ".")]
    pub path: PathBuf,

    /// Number of trailing lines to print.
    #[arg(long, short = 'n', default_value_t = 50)]
    pub lines: usize,

    /// Config file to use instead of the layered lookup.
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,
}

impl LogsArgs {
    pub fn run(self) -> Result<()> {
        let root = resolve_root(&self.path)?;
        let config = load_config(&root, self.config.as_deref())?;
        print_tail(&config.log_file_path(&root), self.lines)
    }
}

fn print_tail(path: &Path, lines: usize) -> Result<()> {
    if !path.exists() {
        println!("log file not found: {}", path.display());
        return Ok(());
    }

    let file = File::open(path).with_context(|| format!("open {}", path.display()))?;
    let reader = BufReader::new(file);

    let mut tail = VecDeque::<String>::with_capacity(lines);
    for line in reader.lines() {
        let line = line.with_context(|| format!("read {}", path.display()))?;
        if lines == 0 {
            continue;
        }
        if tail.len() == lines {
            tail.pop_front();
        }
        tail.push_back(line);
    }

    println!("==> {} <==", path.display());
    for line in tail {
        println!("{line}");
    }
    Ok(())
}
