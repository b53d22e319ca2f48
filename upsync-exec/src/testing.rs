//! Scripted executor for tests.
//!
//! [`ScriptedExecutor`] answers commands from a list of rules matched on an
//! argument prefix and records every invocation, so tests can drive the
//! orchestrator through any starting state without a real repository and then
//! assert on exactly which commands were issued.
//!
//! ```ignore
//! let exec = ScriptedExecutor::new()
//!     .on(&["branch", "--show-current"], Reply::stdout("main\n"))
//!     .once(&["rev-parse", "--verify"], Reply::failure(128, "fatal: Needed a single revision"));
//! ```
//!
//! Rules are tried in insertion order; `once` rules retire after one match.
//! Unmatched commands succeed with empty output.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::command::CommandLine;
use crate::error::ExecError;
use crate::executor::{Executor, RawOutput};

type Effect = Box<dyn Fn(&Path) + Send>;

/// Canned answer for a matched command.
#[derive(Debug, Clone)]
pub enum Reply {
    Output(RawOutput),
    /// Simulate a process that could not be started.
    SpawnError(std::io::ErrorKind),
}

impl Reply {
    /// Exit 0, no output.
    pub fn success() -> Self {
        Self::output(0, "", "")
    }

    /// Exit 0 with `stdout`.
    pub fn stdout(stdout: &str) -> Self {
        Self::output(0, stdout, "")
    }

    /// Non-zero exit with `stderr`.
    pub fn failure(exit_code: i32, stderr: &str) -> Self {
        Self::output(exit_code, "", stderr)
    }

    pub fn output(exit_code: i32, stdout: &str, stderr: &str) -> Self {
        Self::Output(RawOutput {
            exit_code,
            stdout: stdout.to_string(),
            stderr: stderr.to_string(),
        })
    }

    /// The executable is not installed.
    pub fn not_found() -> Self {
        Self::SpawnError(std::io::ErrorKind::NotFound)
    }
}

/// One recorded call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: PathBuf,
}

impl Invocation {
    /// Arguments joined by spaces, for readable assertion messages.
    pub fn line(&self) -> String {
        self.args.join(" ")
    }

    pub fn starts_with(&self, prefix: &[&str]) -> bool {
        prefix.len() <= self.args.len()
            && prefix.iter().zip(&self.args).all(|(want, have)| want == have)
    }
}

struct Rule {
    prefix: Vec<String>,
    reply: Reply,
    remaining: Option<usize>,
    effect: Option<Effect>,
}

/// Rule-driven, recording [`Executor`].
#[derive(Default)]
pub struct ScriptedExecutor {
    rules: Mutex<Vec<Rule>>,
    calls: Mutex<Vec<Invocation>>,
}

impl ScriptedExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer every command starting with `prefix` with `reply`.
    pub fn on(self, prefix: &[&str], reply: Reply) -> Self {
        self.push(prefix, reply, None, None)
    }

    /// Answer the next command starting with `prefix` with `reply`, then retire.
    pub fn once(self, prefix: &[&str], reply: Reply) -> Self {
        self.push(prefix, reply, Some(1), None)
    }

    /// Like [`ScriptedExecutor::on`], also running `effect` with the working
    /// directory whenever the rule matches (e.g. create `.git` on `init`).
    pub fn on_with<F>(self, prefix: &[&str], reply: Reply, effect: F) -> Self
    where
        F: Fn(&Path) + Send + 'static,
    {
        self.push(prefix, reply, None, Some(Box::new(effect)))
    }

    fn push(
        self,
        prefix: &[&str],
        reply: Reply,
        remaining: Option<usize>,
        effect: Option<Effect>,
    ) -> Self {
        self.rules.lock().expect("rules lock").push(Rule {
            prefix: prefix.iter().map(|s| s.to_string()).collect(),
            reply,
            remaining,
            effect,
        });
        self
    }

    /// Every invocation so far, in order.
    pub fn calls(&self) -> Vec<Invocation> {
        self.calls.lock().expect("calls lock").clone()
    }

    /// Every invocation rendered with [`Invocation::line`].
    pub fn lines(&self) -> Vec<String> {
        self.calls().iter().map(Invocation::line).collect()
    }

    /// Number of invocations whose arguments start with `prefix`.
    pub fn count(&self, prefix: &[&str]) -> usize {
        self.calls().iter().filter(|c| c.starts_with(prefix)).count()
    }

    /// `true` if any invocation's arguments start with `prefix`.
    pub fn issued(&self, prefix: &[&str]) -> bool {
        self.count(prefix) > 0
    }

    /// Index of the first invocation starting with `prefix`.
    pub fn position(&self, prefix: &[&str]) -> Option<usize> {
        self.calls().iter().position(|c| c.starts_with(prefix))
    }
}

impl Executor for ScriptedExecutor {
    fn run(&self, command: &CommandLine, cwd: &Path) -> Result<RawOutput, ExecError> {
        self.calls.lock().expect("calls lock").push(Invocation {
            program: command.program().to_string(),
            args: command.arguments().to_vec(),
            cwd: cwd.to_path_buf(),
        });

        let mut rules = self.rules.lock().expect("rules lock");
        let matched = rules.iter_mut().find(|rule| {
            rule.remaining != Some(0) && command.starts_with(rule.prefix.as_slice())
        });

        let Some(rule) = matched else {
            return Ok(RawOutput::default());
        };
        if let Some(n) = rule.remaining.as_mut() {
            *n -= 1;
        }
        if let Some(effect) = &rule.effect {
            effect(cwd);
        }

        match &rule.reply {
            Reply::Output(out) => Ok(out.clone()),
            Reply::SpawnError(kind) => Err(ExecError::Spawn {
                command: command.to_string(),
                source: std::io::Error::new(*kind, "scripted spawn failure"),
            }),
        }
    }
}
