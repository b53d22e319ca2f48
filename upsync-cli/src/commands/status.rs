//! `upsync status` — repository state, ignored paths and remote branches.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

use upsync_core::{RepositoryState, SyncConfig};
use upsync_exec::ProcessExecutor;
use upsync_sync::report::{ignored_report, IgnoredReport};
use upsync_sync::{remote, state, Git};

use super::{load_config, resolve_root};
use crate::logging;

/// Arguments for `upsync status`.
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Working tree to inspect.
    #[arg(default_value = ".")]
    pub path: PathBuf,

    /// Config file to use instead of the layered lookup.
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Skip `fetch` and list only the remote branches already known locally.
    #[arg(long)]
    pub offline: bool,

    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

impl StatusArgs {
    pub fn run(self) -> Result<()> {
        let root = resolve_root(&self.path)?;
        let config = load_config(&root, self.config.as_deref())?;
        logging::init(None)?;

        let executor = ProcessExecutor::new();
        let git = Git::new(&executor, &config.git_program, &root);
        let report = build_report(&git, &config, self.offline)?;

        if self.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&report).context("failed to serialize status JSON")?
            );
            return Ok(());
        }
        print_table(&root, &config, &report);
        Ok(())
    }
}

#[derive(Debug, Serialize)]
struct StatusReport {
    state: RepositoryState,
    ignored: IgnoredReport,
    remote_branches: Vec<String>,
}

#[derive(Tabled)]
struct StateRow {
    #[tabled(rename = "")]
    indicator: String,
    #[tabled(rename = "check")]
    check: &'static str,
    #[tabled(rename = "value")]
    value: String,
}

fn build_report(git: &Git<'_>, config: &SyncConfig, offline: bool) -> Result<StatusReport> {
    let repo_state = state::capture(git, config).context("failed to inspect repository")?;
    if !repo_state.is_initialized {
        return Ok(StatusReport {
            state: repo_state,
            ignored: IgnoredReport::default(),
            remote_branches: Vec::new(),
        });
    }

    let ignored = ignored_report(git).context("failed to list ignored paths")?;
    let remote_branches = if !repo_state.remote_configured {
        Vec::new()
    } else if offline {
        local_remote_branches(git, &config.remote_name)?
    } else {
        remote::list_remote_branches(git, &config.remote_name)
            .context("failed to list remote branches")?
    };

    Ok(StatusReport {
        state: repo_state,
        ignored,
        remote_branches,
    })
}

fn local_remote_branches(git: &Git<'_>, remote_name: &str) -> Result<Vec<String>> {
    let prefix = format!("refs/remotes/{remote_name}/");
    let listing = git
        .probe(&["for-each-ref", "--format=%(refname)", &prefix])
        .context("failed to list remote-tracking refs")?;
    Ok(listing
        .stdout
        .lines()
        .filter_map(|line| line.trim().strip_prefix(&prefix))
        .filter(|name| *name != "HEAD")
        .map(str::to_string)
        .collect())
}

fn print_table(root: &Path, config: &SyncConfig, report: &StatusReport) {
    println!(
        "upsync v{} | {}",
        env!("CARGO_PKG_VERSION"),
        root.display().to_string().bold()
    );

    let s = &report.state;
    if !s.is_initialized {
        println!("{} not a repository yet; `upsync sync` will initialize it", indicator(false));
        return;
    }

    let url = config.remote_url.as_deref().unwrap_or("(not configured)");
    let rows = vec![
        StateRow {
            indicator: indicator(true),
            check: "branch",
            value: s.current_branch.clone(),
        },
        StateRow {
            indicator: indicator(s.has_any_commit),
            check: "history",
            value: if s.has_any_commit { "has commits" } else { "no commits yet" }.to_string(),
        },
        StateRow {
            indicator: indicator(s.remote_configured),
            check: "remote",
            value: if s.remote_configured {
                config.remote_name.clone()
            } else {
                format!("'{}' missing", config.remote_name)
            },
        },
        StateRow {
            indicator: indicator(s.remote_url_matches),
            check: "remote url",
            value: url.to_string(),
        },
        StateRow {
            indicator: if s.is_dirty { "■".yellow().bold().to_string() } else { indicator(true) },
            check: "working tree",
            value: if s.is_dirty { "uncommitted changes" } else { "clean" }.to_string(),
        },
    ];
    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{table}");

    if report.ignored.is_empty() {
        println!("No ignored paths.");
    } else {
        println!("{} ignored path(s):", report.ignored.len());
        for line in report.ignored.summary_lines() {
            println!("  {line}");
        }
    }

    if !report.remote_branches.is_empty() {
        println!("Remote branches: {}", report.remote_branches.join(", "));
    }
}

fn indicator(ok: bool) -> String {
    if ok {
        "■".green().bold().to_string()
    } else {
        "■".red().bold().to_string()
    }
}
