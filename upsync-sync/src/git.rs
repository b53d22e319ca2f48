//! Thin handle binding an [`Executor`] to a working tree.
//!
//! Three call styles cover every use in upsync:
//!
//! | Method | Logs | Error classification |
//! |---|---|---|
//! | [`Git::run`] | yes | fatal ([`SyncError::CommandFailure`]) |
//! | [`Git::try_run`] | yes | returned for the caller to inspect |
//! | [`Git::probe`] | no | returned for the caller to inspect |

use std::path::{Path, PathBuf};

use upsync_core::CommandResult;
use upsync_exec::{CommandLine, ExecOptions, Executor};

use crate::error::SyncError;

/// Name of the metadata directory inside the working tree.
pub const GIT_DIR: &str = ".git";

#[derive(Clone, Copy)]
pub struct Git<'a> {
    executor: &'a dyn Executor,
    program: &'a str,
    root: &'a Path,
}

impl<'a> Git<'a> {
    pub fn new(executor: &'a dyn Executor, program: &'a str, root: &'a Path) -> Self {
        Self {
            executor,
            program,
            root,
        }
    }

    /// Working-tree root every command runs in.
    pub fn root(&self) -> &'a Path {
        self.root
    }

    pub fn program(&self) -> &'a str {
        self.program
    }

    /// `<root>/.git`
    pub fn git_dir(&self) -> PathBuf {
        self.root.join(GIT_DIR)
    }

    pub fn command(&self, args: &[&str]) -> CommandLine {
        CommandLine::new(self.program).args(args.iter().copied())
    }

    pub fn execute(&self, args: &[&str], options: ExecOptions) -> Result<CommandResult, SyncError> {
        Ok(self
            .executor
            .execute(&self.command(args), self.root, options)?)
    }

    /// Required step: failures abort.
    pub fn run(&self, args: &[&str]) -> Result<CommandResult, SyncError> {
        self.execute(args, ExecOptions::checked())
    }

    /// Visible step whose failure the caller handles.
    pub fn try_run(&self, args: &[&str]) -> Result<CommandResult, SyncError> {
        self.execute(args, ExecOptions::lenient())
    }

    /// Silent query.
    pub fn probe(&self, args: &[&str]) -> Result<CommandResult, SyncError> {
        self.execute(args, ExecOptions::quiet())
    }
}

impl std::fmt::Debug for Git<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Git")
            .field("program", &self.program)
            .field("root", &self.root)
            .finish()
    }
}
