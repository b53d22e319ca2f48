//! START-state checks: the version-control tool is installed and the network
//! answers.

use std::time::Duration;

use crate::error::SyncError;
use crate::git::Git;

/// Reachability check against a well-known host.
pub trait NetworkProbe {
    fn is_reachable(&self, host: &str) -> bool;
}

impl<F> NetworkProbe for F
where
    F: Fn(&str) -> bool,
{
    fn is_reachable(&self, host: &str) -> bool {
        self(host)
    }
}

/// HTTPS `HEAD` request via `ureq`.
///
/// Any HTTP response, error statuses included, proves the network works;
/// only transport failures (DNS, connect, TLS, timeout) count as unreachable.
#[derive(Debug, Clone)]
pub struct HttpProbe {
    timeout: Duration,
}

impl HttpProbe {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl NetworkProbe for HttpProbe {
    fn is_reachable(&self, host: &str) -> bool {
        let agent = ureq::AgentBuilder::new().timeout(self.timeout).build();
        match agent.head(&format!("https://{host}")).call() {
            Ok(_) | Err(ureq::Error::Status(..)) => true,
            Err(ureq::Error::Transport(e)) => {
                tracing::debug!("network probe to {host} failed: {e}");
                false
            }
        }
    }
}

/// Run `<git> --version`; returns the reported version line.
pub fn check_tooling(git: &Git<'_>) -> Result<String, SyncError> {
    let missing = || SyncError::ToolingMissing {
        program: git.program().to_string(),
    };
    let result = git.probe(&["--version"]).map_err(|_| missing())?;
    if !result.exited_cleanly() {
        return Err(missing());
    }
    Ok(result.stdout_trimmed().to_string())
}

pub fn check_network(probe: &dyn NetworkProbe, host: &str) -> Result<(), SyncError> {
    if probe.is_reachable(host) {
        Ok(())
    } else {
        Err(SyncError::NetworkUnreachable {
            host: host.to_string(),
        })
    }
}
