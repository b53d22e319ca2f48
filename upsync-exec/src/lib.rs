//! # upsync-exec
//!
//! Runs external commands and turns their output into a classified
//! [`CommandResult`](upsync_core::CommandResult).
//!
//! Nothing above this crate spawns processes directly: the orchestrator only
//! sees the [`Executor`] trait, so tests substitute
//! [`testing::ScriptedExecutor`] for [`ProcessExecutor`].

pub mod classify;
pub mod command;
pub mod error;
pub mod executor;
#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use command::CommandLine;
pub use error::ExecError;
pub use executor::{ExecOptions, Executor, ProcessExecutor, RawOutput};
