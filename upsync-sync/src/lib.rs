//! # upsync-sync
//!
//! Reconciles a local working tree with a single remote endpoint by driving
//! the `git` command-line tool.
//!
//! [`Orchestrator::run`] is the entry point: it walks the state machine in
//! [`orchestrator`] and composes the building blocks below, each usable on
//! its own:
//!
//! - [`cleaner`] — removes corrupted metadata before anything mutates
//! - [`remote`] — remote registration, URL drift, repository settings
//! - [`branch`] — active branch resolution that never fails
//! - [`ignore_file`] — default ignore rules and append-only exclusions
//! - [`large_files`] — excludes and unstages oversized files
//! - [`state`] — fresh repository probes and snapshots
//! - [`report`] — post-sync summary of ignored paths

pub mod branch;
pub mod cleaner;
pub mod error;
pub mod git;
pub mod ignore_file;
pub mod large_files;
pub mod orchestrator;
pub mod preflight;
pub mod remote;
pub mod report;
pub mod state;

pub use error::SyncError;
pub use git::Git;
pub use orchestrator::{CommitKind, Orchestrator, SyncOutcome, SyncReport, SyncState};
pub use preflight::{HttpProbe, NetworkProbe};
