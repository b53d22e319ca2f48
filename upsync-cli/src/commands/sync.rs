//! `upsync sync` — run one sync of a working tree.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Args;
use colored::Colorize;
use serde::Serialize;

use upsync_core::SyncConfig;
use upsync_exec::ProcessExecutor;
use upsync_sync::orchestrator::CommitKind;
use upsync_sync::remote::RemoteChange;
use upsync_sync::{HttpProbe, Orchestrator, SyncOutcome, SyncReport};

use super::{load_config, resolve_root};
use crate::logging;

/// Arguments for `upsync sync`.
#[derive(Args, Debug)]
pub struct SyncArgs {
    /// Working tree to sync.
    #[arg(default_value = ".")]
    pub path: PathBuf,

    /// Remote URL (overrides the config file).
    #[arg(long, value_name = "URL")]
    pub remote_url: Option<String>,

    /// Remote name (overrides the config file).
    #[arg(long, value_name = "NAME")]
    pub remote_name: Option<String>,

    /// Branch used when none is checked out.
    #[arg(long, value_name = "NAME")]
    pub branch: Option<String>,

    /// Exclude files larger than this many MB.
    #[arg(long, value_name = "MB")]
    pub threshold_mb: Option<u64>,

    /// Config file to use instead of the layered lookup.
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Emit the outcome as JSON on stdout.
    #[arg(long)]
    pub json: bool,
}

impl SyncArgs {
    pub fn run(self) -> Result<()> {
        let root = resolve_root(&self.path)?;
        let mut config = load_config(&root, self.config.as_deref())?;
        self.apply_overrides(&mut config);

        logging::init(Some(&config.log_file_path(&root)))?;

        let executor = ProcessExecutor::new();
        let probe = HttpProbe::new(Duration::from_secs(config.network_timeout_secs));
        let remote_name = config.remote_name.clone();
        let outcome = Orchestrator::new(root, config, &executor, &probe).run();

        if self.json {
            print_json(&outcome)?;
        } else if let SyncOutcome::Success(report) = &outcome {
            print_report(report, &remote_name);
        }

        match outcome {
            SyncOutcome::Success(_) => Ok(()),
            SyncOutcome::Aborted(e) => bail!("sync aborted: {e}"),
            SyncOutcome::Failed(e) => bail!("sync failed: {e}"),
        }
    }

    fn apply_overrides(&self, config: &mut SyncConfig) {
        if let Some(url) = &self.remote_url {
            config.remote_url = Some(url.clone());
        }
        if let Some(name) = &self.remote_name {
            config.remote_name = name.clone();
        }
        if let Some(branch) = &self.branch {
            config.default_branch = branch.clone();
        }
        if let Some(mb) = self.threshold_mb {
            config.large_file_threshold_mb = mb;
        }
    }
}

#[derive(Serialize)]
struct SyncJson<'a> {
    outcome: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    report: Option<&'a SyncReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<ErrorJson>,
}

#[derive(Serialize)]
struct ErrorJson {
    kind: &'static str,
    message: String,
}

fn print_json(outcome: &SyncOutcome) -> Result<()> {
    let payload = SyncJson {
        outcome: outcome.label(),
        report: outcome.report(),
        error: outcome.error().map(|e| ErrorJson {
            kind: e.kind(),
            message: e.to_string(),
        }),
    };
    println!(
        "{}",
        serde_json::to_string_pretty(&payload).context("failed to serialize sync JSON")?
    );
    Ok(())
}

fn print_report(report: &SyncReport, remote_name: &str) {
    let Some(commit) = &report.commit else {
        println!(
            "{} '{}': nothing to commit",
            "✓".green().bold(),
            report.branch
        );
        return;
    };

    let pushed = if report.pushed { "pushed" } else { "committed" };
    println!(
        "{} '{}' {pushed} to '{remote_name}'",
        "✓".green().bold(),
        report.branch
    );
    match commit {
        CommitKind::Initial { message } => println!("  ✎  initial commit: {message}"),
        CommitKind::Update { message } => println!("  ✎  {message}"),
    }
    if report.initialized {
        println!("  +  repository initialized");
    }
    match &report.remote {
        Some(RemoteChange::Added) => println!("  +  remote '{remote_name}' added"),
        Some(RemoteChange::Updated { previous }) => {
            println!("  ~  remote '{remote_name}' updated (was {previous})")
        }
        Some(RemoteChange::Unchanged) | None => {}
    }
    if report.ignore_file_created {
        println!("  +  default ignore file created");
    }
    if report.pulled {
        println!("  ↓  merged remote changes");
    }
    for entry in &report.excluded {
        println!("  {}  {entry} (too large, now ignored)", "!".yellow().bold());
    }
    if !report.cleanup.removed.is_empty() {
        println!(
            "  ·  cleaned {} corrupted metadata file(s)",
            report.cleanup.removed.len()
        );
    }
}
