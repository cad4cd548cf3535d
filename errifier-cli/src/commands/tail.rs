//! `errifier tail`: last lines of a log file.
//!
//! With a path the file is read locally and no daemon is needed; with `--id`
//! the daemon resolves the watch and reads it.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Args;

use errifier_core::{tail, EntryId, WatchConfig};
use errifier_daemon::request_tail;

use super::{daemon_failure, home_dir};

#[derive(Args, Debug)]
pub struct TailArgs {
    /// Log file to read.
    #[arg(required_unless_present = "id", conflicts_with = "id")]
    pub path: Option<PathBuf>,

    /// Read the file behind a watch id instead.
    #[arg(long)]
    pub id: Option<usize>,

    /// Number of lines; defaults to `tail_lines` from the config.
    #[arg(short = 'n', long)]
    pub lines: Option<usize>,
}

impl TailArgs {
    pub fn run(self) -> Result<()> {
        let home = home_dir()?;

        let lines = match (self.path, self.id) {
            (Some(path), _) => {
                let n = match self.lines {
                    Some(n) => n,
                    None => WatchConfig::load_at(&home)
                        .context("failed to load config")?
                        .tail_lines,
                };
                tail(&path, n).with_context(|| format!("failed to tail {}", path.display()))?
            }
            (None, Some(id)) => request_tail(&home, EntryId(id), self.lines)
                .map_err(|err| daemon_failure(err, "tail watch"))?,
            (None, None) => bail!("give a path or --id"),
        };

        for line in lines {
            println!("{line}");
        }
        Ok(())
    }
}
