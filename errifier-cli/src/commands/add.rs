//! `errifier add`: register a log file with the daemon.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use colored::Colorize;

use errifier_daemon::request_add;

use super::{daemon_failure, home_dir};

#[derive(Args, Debug)]
pub struct AddArgs {
    /// Log file to watch.
    pub path: PathBuf,

    /// Name shown in notifications; must be unique.
    #[arg(long, short)]
    pub label: String,
}

impl AddArgs {
    pub fn run(self) -> Result<()> {
        let home = home_dir()?;
        // The daemon resolves paths against its own cwd, so send an absolute one.
        let path = std::path::absolute(&self.path).unwrap_or(self.path);

        let id = request_add(&home, &path, &self.label)
            .map_err(|err| daemon_failure(err, "add watch"))?;
        println!(
            "{} {} as '{}' (id {id})",
            "watching".green(),
            path.display(),
            self.label.trim()
        );
        Ok(())
    }
}
