//! upsync — one-way repository sync CLI.
//!
//! # Usage
//!
//! ```text
//! upsync init [PATH] --remote-url <URL> [--remote-name <NAME>] [--branch <NAME>] [--force]
//! upsync sync [PATH] [--remote-url <URL>] [--remote-name <NAME>] [--branch <NAME>]
//!                    [--threshold-mb <MB>] [--config <FILE>] [--json]
//! upsync status [PATH] [--config <FILE>] [--offline] [--json]
//! upsync clean [PATH] [--config <FILE>]
//! upsync logs [PATH] [--lines <N>] [--config <FILE>]
//! ```

mod commands;
mod logging;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{
    clean::CleanArgs, init::InitArgs, logs::LogsArgs, status::StatusArgs, sync::SyncArgs,
};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "upsync",
    version,
    about = "Publish a local working tree to a single remote repository",
    long_about = None,
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Write an upsync.yaml for a working tree.
    Init(InitArgs),

    /// Clean, stage, commit, pull and force-push a working tree.
    Sync(SyncArgs),

    /// Show repository state, ignored paths and remote branches.
    Status(StatusArgs),

    /// Remove corrupted metadata without syncing.
    Clean(CleanArgs),

    /// Print the tail of the sync log.
    Logs(LogsArgs),
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Init(args) => args.run(),
        Commands::Sync(args) => args.run(),
        Commands::Status(args) => args.run(),
        Commands::Clean(args) => args.run(),
        Commands::Logs(args) => args.run(),
    }
}
