use anyhow::Result;
use clap::Args;

use errifier_core::EntryId;
use errifier_daemon::request_remove;

use super::{daemon_failure, home_dir};

#[derive(Args, Debug)]
pub struct RemoveArgs {
    /// Watch id as shown by `errifier list`.
    pub id: usize,
}

impl RemoveArgs {
    pub fn run(self) -> Result<()> {
        let home = home_dir()?;
        let removed = request_remove(&home, EntryId(self.id))
            .map_err(|err| daemon_failure(err, "remove watch"))?;
        println!(
            "stopped watching {} ('{}')",
            removed.path.display(),
            removed.label
        );
        Ok(())
    }
}
