//! upsync core library — domain types, configuration, errors.
//!
//! - [`types`] — command results, repository snapshots, exclusion entries
//! - [`config`] — [`SyncConfig`] with documented defaults, YAML load / save
//! - [`error`] — [`ConfigError`]

pub mod config;
pub mod error;
pub mod types;

pub use config::SyncConfig;
pub use error::ConfigError;
pub use types::{Classification, CommandResult, ExclusionEntry, RepositoryState};
