pub mod add;
pub mod daemon;
pub mod list;
pub mod remove;
pub mod tail;
pub mod toggle;

use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use errifier_daemon::DaemonError;

pub(crate) fn home_dir() -> Result<PathBuf> {
    dirs::home_dir().context("could not determine home directory")
}

/// Turn a daemon client error into a user-facing one, with a hint when the
/// daemon is simply not running.
pub(crate) fn daemon_failure(err: DaemonError, action: &str) -> anyhow::Error {
    match err {
        DaemonError::DaemonNotRunning { .. } => {
            anyhow!("daemon is not running; start it with `errifier daemon start`")
        }
        other => anyhow::Error::new(other).context(format!("failed to {action}")),
    }
}
