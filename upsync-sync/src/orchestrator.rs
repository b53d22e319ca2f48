//! Sync orchestrator.
//!
//! One run walks an explicit state machine, one blocking command at a time:
//!
//! ```text
//! START ──► CLEAN ──┬──► INIT ───────┬──► STAGE ──► COMMIT_CHECK ──┬──► COMMIT ──┬──► PUSH_NEW ──► DONE
//!                   └──► CONFIGURE ──┘                             │             └──► PULL ──► PUSH ──► DONE
//!                                                                  └──► DONE (nothing to commit)
//! ```
//!
//! Every step returns the next [`SyncState`] or a [`SyncError`]. A
//! [`SyncError::MergeConflict`] ends the run as [`SyncOutcome::Aborted`]
//! (after the merge has been aborted); every other error ends it as
//! [`SyncOutcome::Failed`].
//!
//! # Push policy
//!
//! Pushes to an existing remote branch are always forced: the local branch
//! overwrites the remote one. Remote-only commits survive only if the pull
//! merged them in first. A pull that fails without a conflict is logged and
//! the forced push still runs, which discards whatever the remote had.

use std::any::Any;
use std::collections::HashSet;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;

use serde::Serialize;
use walkdir::WalkDir;

use upsync_core::{CommandResult, ExclusionEntry, SyncConfig};
use upsync_exec::classify::{has_conflict, is_auth_failure, lacks_upstream};
use upsync_exec::Executor;

use crate::branch::resolve_branch;
use crate::cleaner::{self, CleanupReport};
use crate::error::{io_err, SyncError};
use crate::git::{Git, GIT_DIR};
use crate::ignore_file::ensure_ignore_file;
use crate::large_files::{relative_slash_path, scan_and_exclude};
use crate::preflight::{check_network, check_tooling, NetworkProbe};
use crate::remote::{self, RemoteChange};
use crate::report::report_ignored;
use crate::state;

/// Format of the `{timestamp}` substituted into commit messages.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

// ---------------------------------------------------------------------------
// States and outcomes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncState {
    Start,
    Clean,
    Init,
    Configure,
    Stage,
    CommitCheck,
    Commit,
    PushNew,
    Pull,
    Push,
    Done,
}

impl fmt::Display for SyncState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SyncState::Start => "start",
            SyncState::Clean => "clean",
            SyncState::Init => "init",
            SyncState::Configure => "configure",
            SyncState::Stage => "stage",
            SyncState::CommitCheck => "commit_check",
            SyncState::Commit => "commit",
            SyncState::PushNew => "push_new",
            SyncState::Pull => "pull",
            SyncState::Push => "push",
            SyncState::Done => "done",
        };
        f.write_str(name)
    }
}

/// The commit a run created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CommitKind {
    /// First commit of the repository; pushed with upstream registration.
    Initial { message: String },
    Update { message: String },
}

impl CommitKind {
    pub fn message(&self) -> &str {
        match self {
            CommitKind::Initial { message } | CommitKind::Update { message } => message,
        }
    }
}

/// What a successful run did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub branch: String,
    /// The repository was created by this run.
    pub initialized: bool,
    pub remote: Option<RemoteChange>,
    pub ignore_file_created: bool,
    /// Paths newly added to the ignore file by the large-file guard.
    pub excluded: Vec<ExclusionEntry>,
    /// `None` when there was nothing to commit.
    pub commit: Option<CommitKind>,
    pub pulled: bool,
    pub pushed: bool,
    pub cleanup: CleanupReport,
    /// Every state visited, in order.
    pub states: Vec<SyncState>,
}

#[derive(Debug)]
pub enum SyncOutcome {
    Success(SyncReport),
    /// A merge conflict stopped the run; the merge was aborted.
    Aborted(SyncError),
    Failed(SyncError),
}

impl SyncOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, SyncOutcome::Success(_))
    }

    pub fn report(&self) -> Option<&SyncReport> {
        match self {
            SyncOutcome::Success(report) => Some(report),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&SyncError> {
        match self {
            SyncOutcome::Success(_) => None,
            SyncOutcome::Aborted(e) | SyncOutcome::Failed(e) => Some(e),
        }
    }

    /// `success`, `aborted` or `failed`.
    pub fn label(&self) -> &'static str {
        match self {
            SyncOutcome::Success(_) => "success",
            SyncOutcome::Aborted(_) => "aborted",
            SyncOutcome::Failed(_) => "failed",
        }
    }
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

pub struct Orchestrator<'a> {
    root: PathBuf,
    config: SyncConfig,
    executor: &'a dyn Executor,
    probe: &'a dyn NetworkProbe,
}

impl<'a> Orchestrator<'a> {
    pub fn new(
        root: impl Into<PathBuf>,
        config: SyncConfig,
        executor: &'a dyn Executor,
        probe: &'a dyn NetworkProbe,
    ) -> Self {
        Self {
            root: root.into(),
            config,
            executor,
            probe,
        }
    }

    /// Run one sync. Never panics: an unexpected panic inside a step is
    /// caught and reported as [`SyncError::Internal`].
    pub fn run(&self) -> SyncOutcome {
        if let Err(e) = self.config.validate() {
            tracing::error!("invalid configuration: {e}");
            return SyncOutcome::Failed(e.into());
        }

        tracing::info!("sync started in {}", self.root.display());
        let mut report = SyncReport::default();
        let result = panic::catch_unwind(AssertUnwindSafe(|| self.drive(&mut report)));

        let outcome = match result {
            Ok(Ok(())) => SyncOutcome::Success(report),
            Ok(Err(e @ SyncError::MergeConflict { .. })) => SyncOutcome::Aborted(e),
            Ok(Err(e)) => SyncOutcome::Failed(e),
            Err(payload) => SyncOutcome::Failed(SyncError::Internal(panic_message(payload))),
        };

        match &outcome {
            SyncOutcome::Success(_) => tracing::info!("sync completed"),
            SyncOutcome::Aborted(e) => tracing::error!("sync aborted: {e}"),
            SyncOutcome::Failed(e) => tracing::error!("sync failed: {e}"),
        }
        outcome
    }

    fn git(&self) -> Git<'_> {
        Git::new(self.executor, &self.config.git_program, &self.root)
    }

    fn drive(&self, report: &mut SyncReport) -> Result<(), SyncError> {
        let git = self.git();
        let mut current = SyncState::Start;
        loop {
            report.states.push(current);
            tracing::debug!("state: {current}");
            current = match current {
                SyncState::Start => self.start(&git)?,
                SyncState::Clean => self.clean(&git, report),
                SyncState::Init => self.init(&git, report)?,
                SyncState::Configure => self.configure(&git, report)?,
                SyncState::Stage => self.stage(&git, report)?,
                SyncState::CommitCheck => self.commit_check(&git)?,
                SyncState::Commit => self.commit(&git, report)?,
                SyncState::PushNew => self.push_new(&git, report)?,
                SyncState::Pull => self.pull(&git, report)?,
                SyncState::Push => self.push(&git, report)?,
                SyncState::Done => {
                    report_ignored(&git);
                    return Ok(());
                }
            };
        }
    }

    // -- steps ---------------------------------------------------------------

    fn start(&self, git: &Git<'_>) -> Result<SyncState, SyncError> {
        let version = check_tooling(git)?;
        tracing::debug!("{version}");
        check_network(self.probe, &self.config.network_probe_host)?;
        Ok(SyncState::Clean)
    }

    fn clean(&self, git: &Git<'_>, report: &mut SyncReport) -> SyncState {
        report.cleanup = cleaner::clean(git, &self.config.remote_name);
        if state::is_initialized(&self.root) {
            SyncState::Configure
        } else {
            SyncState::Init
        }
    }

    fn init(&self, git: &Git<'_>, report: &mut SyncReport) -> Result<SyncState, SyncError> {
        let url = self.config.remote_url()?;
        tracing::info!("initializing repository in {}", self.root.display());
        git.run(&["init"])?;
        report.initialized = true;

        let head = format!("refs/heads/{}", self.config.default_branch);
        let result = git.try_run(&["symbolic-ref", "HEAD", &head])?;
        if result.is_error() {
            tracing::warn!("could not point HEAD at {head}");
        }

        if !remote::probe_remote(git, url) {
            return Err(SyncError::RemoteUnreachable {
                url: url.to_string(),
            });
        }
        report.remote = Some(remote::ensure_remote(git, &self.config.remote_name, url)?);
        report.ignore_file_created |= ensure_ignore_file(&self.ignore_path(), &self.config.log_file)?;
        remote::apply_settings(git, &self.config.git_settings);
        Ok(SyncState::Stage)
    }

    fn configure(&self, git: &Git<'_>, report: &mut SyncReport) -> Result<SyncState, SyncError> {
        let url = self.config.remote_url()?;
        match remote::ensure_remote(git, &self.config.remote_name, url) {
            Ok(change) => report.remote = Some(change),
            Err(e) => tracing::warn!("could not configure remote '{}': {e}", self.config.remote_name),
        }
        remote::apply_settings(git, &self.config.git_settings);

        if let Some(size) = state::store_size_mb(git) {
            if size > self.config.store_size_warning_mb {
                tracing::warn!(
                    "repository store is {size} MB (> {} MB); consider a large-file storage extension",
                    self.config.store_size_warning_mb
                );
            }
        }
        Ok(SyncState::Stage)
    }

    fn stage(&self, git: &Git<'_>, report: &mut SyncReport) -> Result<SyncState, SyncError> {
        let ignore_path = self.ignore_path();
        report.ignore_file_created |= ensure_ignore_file(&ignore_path, &self.config.log_file)?;
        if report.ignore_file_created {
            let name = relative_slash_path(&self.root, &ignore_path)
                .unwrap_or_else(|| self.config.ignore_file.to_string_lossy().into_owned());
            let result = git.try_run(&["add", "--", &name])?;
            if result.is_error() {
                tracing::warn!("could not stage {name}");
            }
        }

        self.warn_if_log_tracked(git);

        report.branch = resolve_branch(git, &self.config.default_branch);
        tracing::info!("branch: {}", report.branch);

        report.excluded =
            scan_and_exclude(git, &ignore_path, self.config.large_file_threshold_bytes())?;

        let bulk = git.try_run(&["add", "."])?;
        if bulk.is_error() {
            tracing::warn!("bulk staging failed; staging directory by directory");
            self.stage_per_directory(git)?;
        }
        Ok(SyncState::CommitCheck)
    }

    fn commit_check(&self, git: &Git<'_>) -> Result<SyncState, SyncError> {
        if state::is_dirty(git)? {
            Ok(SyncState::Commit)
        } else {
            tracing::info!("no changes to commit");
            Ok(SyncState::Done)
        }
    }

    fn commit(&self, git: &Git<'_>, report: &mut SyncReport) -> Result<SyncState, SyncError> {
        let (kind, next) = if state::has_any_commit(git) {
            let timestamp = chrono::Local::now().format(TIMESTAMP_FORMAT).to_string();
            let message = self.config.render_commit_message(&timestamp);
            (CommitKind::Update { message }, SyncState::Pull)
        } else {
            let message = self.config.initial_commit_message.clone();
            (CommitKind::Initial { message }, SyncState::PushNew)
        };
        git.run(&["commit", "-m", kind.message()])?;
        report.commit = Some(kind);
        Ok(next)
    }

    fn push_new(&self, git: &Git<'_>, report: &mut SyncReport) -> Result<SyncState, SyncError> {
        let args: [&str; 4] = ["push", "--set-upstream", self.remote_name(), &report.branch];
        let result = git.try_run(&args)?;
        if result.is_error() {
            return Err(self.push_failure(git, &args, &result));
        }
        report.pushed = true;
        Ok(SyncState::Done)
    }

    fn pull(&self, git: &Git<'_>, report: &mut SyncReport) -> Result<SyncState, SyncError> {
        let remote = self.remote_name();
        let branch = report.branch.as_str();
        if !remote::remote_branch_exists(git, remote, branch) {
            tracing::info!("'{branch}' does not exist on '{remote}' yet; skipping pull");
            return Ok(SyncState::Push);
        }

        let result = git.try_run(&["pull", "--no-edit", "--no-rebase", remote, branch])?;
        if has_conflict(&result) {
            tracing::error!("merge conflicts pulling '{branch}'; aborting the merge");
            match git.try_run(&["merge", "--abort"]) {
                Ok(abort) if !abort.is_error() => {}
                Ok(abort) => tracing::warn!("merge --abort failed: {}", abort.stderr.trim()),
                Err(e) => tracing::warn!("merge --abort failed: {e}"),
            }
            return Err(SyncError::MergeConflict {
                branch: branch.to_string(),
            });
        }
        if result.is_error() {
            tracing::warn!("pull failed without conflicts; continuing with a forced push");
        } else {
            report.pulled = true;
        }
        Ok(SyncState::Push)
    }

    fn push(&self, git: &Git<'_>, report: &mut SyncReport) -> Result<SyncState, SyncError> {
        let remote = self.remote_name();
        let args: [&str; 4] = ["push", "--force", remote, &report.branch];
        let result = git.try_run(&args)?;
        if !result.is_error() {
            report.pushed = true;
            return Ok(SyncState::Done);
        }
        if is_auth_failure(&result) || !lacks_upstream(&result) {
            return Err(self.push_failure(git, &args, &result));
        }

        tracing::info!("no upstream for '{}'; retrying with upstream registration", report.branch);
        let retry: [&str; 5] = ["push", "--force", "--set-upstream", remote, &report.branch];
        let result = git.try_run(&retry)?;
        if result.is_error() {
            return Err(self.push_failure(git, &retry, &result));
        }
        report.pushed = true;
        Ok(SyncState::Done)
    }

    // -- helpers -------------------------------------------------------------

    fn remote_name(&self) -> &str {
        &self.config.remote_name
    }

    fn ignore_path(&self) -> PathBuf {
        self.config.ignore_file_path(&self.root)
    }

    fn push_failure(&self, git: &Git<'_>, args: &[&str], result: &CommandResult) -> SyncError {
        if is_auth_failure(result) {
            self.credential_hint(git);
            return SyncError::AuthenticationFailure {
                remote: self.config.remote_name.clone(),
            };
        }
        SyncError::CommandFailure {
            command: git.command(args).to_string(),
            detail: format!("exit code {}: {}", result.exit_code, result.stderr.trim()),
        }
    }

    /// A log file inside the tree that the ignore rules miss is committed by
    /// every run, so no run is ever a no-op.
    fn warn_if_log_tracked(&self, git: &Git<'_>) {
        let log_path = self.config.log_file_path(&self.root);
        let Some(name) = relative_slash_path(&self.root, &log_path) else {
            return;
        };
        let Ok(result) = git.probe(&["check-ignore", "-q", "--", &name]) else {
            return;
        };
        if result.exit_code == 1 {
            tracing::warn!(
                "log file {name} is not ignored; it will be committed on every sync. \
                 Add it to {}",
                self.config.ignore_file.display()
            );
        }
    }

    fn credential_hint(&self, git: &Git<'_>) {
        let helper = git
            .probe(&["config", "--get", "credential.helper"])
            .map(|r| r.stdout_trimmed().to_string())
            .unwrap_or_default();
        if helper.is_empty() {
            tracing::warn!(
                "no credential helper configured; run `{} config --global credential.helper store` \
                 or use a personal access token as the password",
                git.program()
            );
        } else {
            tracing::warn!("credential helper '{helper}' rejected; refresh the stored credentials");
        }
    }

    /// Stage root-level files and every directory one `add` at a time,
    /// skipping metadata and `batch_skip_dirs`. Fails only when attempts were
    /// made and none succeeded.
    fn stage_per_directory(&self, git: &Git<'_>) -> Result<(), SyncError> {
        let skip: HashSet<&str> = self
            .config
            .batch_skip_dirs
            .iter()
            .map(String::as_str)
            .chain([GIT_DIR])
            .collect();

        let mut targets = Vec::new();
        let mut root_files: Vec<_> = std::fs::read_dir(&self.root)
            .map_err(|e| io_err(&self.root, e))?
            .flatten()
            .filter(|e| e.file_type().map(|t| t.is_file()).unwrap_or(false))
            .map(|e| e.path())
            .collect();
        root_files.sort();
        targets.extend(root_files);

        let walker = WalkDir::new(&self.root)
            .min_depth(1)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| {
                !(e.file_type().is_dir() && skip.contains(&*e.file_name().to_string_lossy()))
            });
        targets.extend(
            walker
                .filter_map(Result::ok)
                .filter(|e| e.file_type().is_dir())
                .map(|e| e.into_path()),
        );

        let (mut attempts, mut successes) = (0usize, 0usize);
        for target in &targets {
            let Some(relative) = relative_slash_path(&self.root, target) else {
                continue;
            };
            attempts += 1;
            match git.try_run(&["add", "--", &relative]) {
                Ok(result) if !result.is_error() => successes += 1,
                Ok(_) => tracing::warn!("could not stage {relative}"),
                Err(e) => tracing::warn!("could not stage {relative}: {e}"),
            }
        }

        tracing::info!("per-directory staging: {successes}/{attempts} path(s) staged");
        if attempts > 0 && successes == 0 {
            return Err(SyncError::CommandFailure {
                command: git.command(&["add"]).to_string(),
                detail: "no path could be staged".to_string(),
            });
        }
        Ok(())
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "panic with a non-string payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use upsync_exec::testing::ScriptedExecutor;

    #[test]
    fn invalid_config_fails_before_any_command() {
        let exec = ScriptedExecutor::new();
        let online = |_: &str| true;
        let outcome = Orchestrator::new("/r", SyncConfig::default(), &exec, &online).run();
        match outcome {
            SyncOutcome::Failed(e) => assert_eq!(e.kind(), "config_error"),
            other => panic!("expected Failed, got {other:?}"),
        }
        assert!(exec.calls().is_empty());
    }

    #[test]
    fn state_names_are_snake_case() {
        assert_eq!(SyncState::CommitCheck.to_string(), "commit_check");
        assert_eq!(SyncState::PushNew.to_string(), "push_new");
    }

    #[test]
    fn commit_kind_exposes_message() {
        let kind = CommitKind::Update {
            message: "Auto-sync on 2024-01-01 00:00:00".into(),
        };
        assert_eq!(kind.message(), "Auto-sync on 2024-01-01 00:00:00");
    }

    #[test]
    fn panic_messages_are_extracted() {
        assert_eq!(panic_message(Box::new("boom")), "boom");
        assert_eq!(panic_message(Box::new(String::from("bang"))), "bang");
        assert_eq!(panic_message(Box::new(7u8)), "panic with a non-string payload");
    }
}
