use anyhow::Result;
use clap::Args;

use errifier_core::EntryId;
use errifier_daemon::request_toggle;

use super::list::state_label;
use super::{daemon_failure, home_dir};

#[derive(Args, Debug)]
pub struct ToggleArgs {
    /// Watch id as shown by `errifier list`.
    pub id: usize,
}

impl ToggleArgs {
    pub fn run(self) -> Result<()> {
        let home = home_dir()?;
        let id = EntryId(self.id);
        let state = request_toggle(&home, id).map_err(|err| daemon_failure(err, "toggle watch"))?;
        println!("watch {id} is now {}", state_label(state));
        Ok(())
    }
}
