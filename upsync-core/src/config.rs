//! Sync configuration.
//!
//! # Resolution order
//!
//! ```text
//! --config <file>                      (explicit, see `load_file`)
//! <repo>/upsync.yaml                   (per repository)
//! <config_dir>/upsync/config.yaml      (per user)
//! built-in defaults
//! ```
//!
//! The first file found wins; there is no field-level merging between files.
//! Command-line overrides are applied by the caller on the returned value.
//!
//! # API pattern
//!
//! As with every path-dependent function in upsync, `load_at` takes the user
//! config directory explicitly so tests can point it at a `TempDir`; `load`
//! derives it from `dirs::config_dir()`.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{io_err, ConfigError};

/// File name of the per-repository config.
pub const CONFIG_FILE_NAME: &str = "upsync.yaml";

pub const BYTES_PER_MB: u64 = 1024 * 1024;

/// Everything the orchestrator needs to know that is not discovered from the
/// repository itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Name of the single remote endpoint.
    pub remote_name: String,
    /// URL of the remote endpoint. Required; see [`SyncConfig::validate`].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote_url: Option<String>,
    /// Branch used when the working tree has no resolvable branch.
    pub default_branch: String,
    /// Files strictly larger than this are excluded from version control.
    pub large_file_threshold_mb: u64,
    /// The packed object store above this size triggers a warning.
    pub store_size_warning_mb: u64,
    /// Host probed over HTTPS before anything else runs.
    pub network_probe_host: String,
    pub network_timeout_secs: u64,
    /// Executable of the version-control tool, looked up on `PATH`.
    pub git_program: String,
    /// Ignore-rules file, relative to the repository root.
    pub ignore_file: PathBuf,
    /// Log file, relative to the repository root.
    ///
    /// The file lives inside the working tree. The default ignore rules list
    /// it, but an ignore file that predates upsync may not: every `upsync
    /// sync` then appends to a tracked file and commits it, so no run is ever
    /// a no-op. Add the path to the ignore file or point it outside the tree.
    pub log_file: PathBuf,
    pub initial_commit_message: String,
    /// Message of every later commit; `{timestamp}` is substituted.
    pub commit_message: String,
    /// Repository-level settings applied on every run.
    pub git_settings: BTreeMap<String, String>,
    /// Directories the per-directory staging fallback never descends into.
    pub batch_skip_dirs: Vec<String>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        let git_settings = [
            ("core.autocrlf", "true"),
            ("diff.renameLimit", "10000"),
            ("diff.renames", "true"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        Self {
            remote_name: "origin".to_string(),
            remote_url: None,
            default_branch: "main".to_string(),
            large_file_threshold_mb: 90,
            store_size_warning_mb: 500,
            network_probe_host: "github.com".to_string(),
            network_timeout_secs: 10,
            git_program: "git".to_string(),
            ignore_file: PathBuf::from(".gitignore"),
            log_file: PathBuf::from("sync_log.txt"),
            initial_commit_message: "Initial commit".to_string(),
            commit_message: "Auto-sync on {timestamp}".to_string(),
            git_settings,
            batch_skip_dirs: [".env", "venv", "node_modules", "__pycache__"]
                .into_iter()
                .map(str::to_string)
                .collect(),
        }
    }
}

impl SyncConfig {
    /// Defaults plus a remote URL; the smallest usable config.
    pub fn with_remote(url: impl Into<String>) -> Self {
        Self {
            remote_url: Some(url.into()),
            ..Self::default()
        }
    }

    /// Reject configs the orchestrator cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self.remote_url.as_deref().map(str::trim) {
            None | Some("") => return Err(ConfigError::MissingRemoteUrl),
            Some(_) => {}
        }
        if self.remote_name.trim().is_empty() {
            return Err(ConfigError::Invalid("remote_name must not be empty".into()));
        }
        if self.remote_name.chars().any(char::is_whitespace) {
            return Err(ConfigError::Invalid(format!(
                "remote_name '{}' must not contain whitespace",
                self.remote_name
            )));
        }
        if self.default_branch.trim().is_empty() {
            return Err(ConfigError::Invalid("default_branch must not be empty".into()));
        }
        if self.git_program.trim().is_empty() {
            return Err(ConfigError::Invalid("git_program must not be empty".into()));
        }
        Ok(())
    }

    /// The configured remote URL, or [`ConfigError::MissingRemoteUrl`].
    pub fn remote_url(&self) -> Result<&str, ConfigError> {
        self.remote_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .ok_or(ConfigError::MissingRemoteUrl)
    }

    pub fn large_file_threshold_bytes(&self) -> u64 {
        self.large_file_threshold_mb.saturating_mul(BYTES_PER_MB)
    }

    /// Substitute `timestamp` into the commit message template.
    pub fn render_commit_message(&self, timestamp: &str) -> String {
        self.commit_message.replace("{timestamp}", timestamp)
    }

    pub fn ignore_file_path(&self, repo: &Path) -> PathBuf {
        repo.join(&self.ignore_file)
    }

    pub fn log_file_path(&self, repo: &Path) -> PathBuf {
        repo.join(&self.log_file)
    }
}

// ---------------------------------------------------------------------------
// Paths
// ---------------------------------------------------------------------------

/// `<repo>/upsync.yaml` — pure, no I/O.
pub fn repo_config_path(repo: &Path) -> PathBuf {
    repo.join(CONFIG_FILE_NAME)
}

/// `<config_dir>/upsync/config.yaml` — pure, no I/O.
pub fn user_config_path_at(config_dir: &Path) -> PathBuf {
    config_dir.join("upsync").join("config.yaml")
}

// ---------------------------------------------------------------------------
// Load
// ---------------------------------------------------------------------------

/// Load a single config file. An empty file yields the defaults.
pub fn load_file(path: &Path) -> Result<SyncConfig, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|e| io_err(path, e))?;
    if contents.trim().is_empty() {
        return Ok(SyncConfig::default());
    }
    serde_yaml::from_str(&contents).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Resolve the config for `repo`, consulting `user_config_dir` when the
/// repository has no config of its own.
pub fn load_at(repo: &Path, user_config_dir: Option<&Path>) -> Result<SyncConfig, ConfigError> {
    let repo_file = repo_config_path(repo);
    if repo_file.exists() {
        return load_file(&repo_file);
    }
    if let Some(dir) = user_config_dir {
        let user_file = user_config_path_at(dir);
        if user_file.exists() {
            return load_file(&user_file);
        }
    }
    Ok(SyncConfig::default())
}

/// `load_at` convenience wrapper using the platform config directory.
pub fn load(repo: &Path) -> Result<SyncConfig, ConfigError> {
    load_at(repo, dirs::config_dir().as_deref())
}

// ---------------------------------------------------------------------------
// Save (atomic)
// ---------------------------------------------------------------------------

/// Write `config` to `<repo>/upsync.yaml`.
///
/// Write flow: serialize → `upsync.yaml.tmp` sibling → `rename`. Refuses to
/// replace an existing file unless `force` is set.
pub fn save_at(repo: &Path, config: &SyncConfig, force: bool) -> Result<PathBuf, ConfigError> {
    let path = repo_config_path(repo);
    if path.exists() && !force {
        return Err(ConfigError::AlreadyExists { path });
    }

    let yaml = serde_yaml::to_string(config)?;
    let tmp = path.with_file_name(format!("{CONFIG_FILE_NAME}.tmp"));
    std::fs::write(&tmp, yaml).map_err(|e| io_err(&tmp, e))?;
    if let Err(e) = std::fs::rename(&tmp, &path) {
        let _ = std::fs::remove_file(&tmp);
        return Err(io_err(&path, e));
    }
    Ok(path)
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
