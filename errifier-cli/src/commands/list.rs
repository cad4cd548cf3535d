//! `errifier list`: every watch the daemon knows about.

use anyhow::{Context, Result};
use chrono::Local;
use clap::Args;
use colored::{ColoredString, Colorize};
use tabled::{settings::Style, Table, Tabled};

use errifier_core::{WatchSnapshot, WatchState};
use errifier_daemon::request_list;

use super::{daemon_failure, home_dir};

#[derive(Args, Debug)]
pub struct ListArgs {
    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Tabled)]
struct WatchRow {
    #[tabled(rename = "id")]
    id: usize,
    #[tabled(rename = "label")]
    label: String,
    #[tabled(rename = "state")]
    state: String,
    #[tabled(rename = "events")]
    events: u64,
    #[tabled(rename = "alerts")]
    alerts: u64,
    #[tabled(rename = "added")]
    added: String,
    #[tabled(rename = "path")]
    path: String,
}

impl ListArgs {
    pub fn run(self) -> Result<()> {
        let home = home_dir()?;
        let watches = request_list(&home).map_err(|err| daemon_failure(err, "list watches"))?;

        if self.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&watches).context("failed to serialize watches")?
            );
            return Ok(());
        }

        print_table(watches);
        Ok(())
    }
}

fn print_table(watches: Vec<WatchSnapshot>) {
    if watches.is_empty() {
        println!("No files are being watched. Add one with `errifier add <path> --label <name>`.");
        return;
    }

    let paused = watches
        .iter()
        .filter(|w| w.state == WatchState::Paused)
        .count();
    println!(
        "{} watches | {} active | {} paused",
        watches.len(),
        watches.len() - paused,
        paused
    );

    let rows: Vec<WatchRow> = watches
        .into_iter()
        .map(|w| WatchRow {
            id: w.id.0,
            label: w.label,
            state: status_cell(w.state, w.attached),
            events: w.events_seen,
            alerts: w.notifications_sent,
            added: w
                .added_at
                .with_timezone(&Local)
                .format("%Y-%m-%d %H:%M")
                .to_string(),
            path: w.path.display().to_string(),
        })
        .collect();
    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{table}");
}

fn status_cell(state: WatchState, attached: bool) -> String {
    if attached {
        state_label(state).to_string()
    } else {
        format!("{} (reopening)", state_label(state))
    }
}

pub(crate) fn state_label(state: WatchState) -> ColoredString {
    match state {
        WatchState::Active => "Active".green(),
        WatchState::Paused => "Paused".yellow(),
    }
}
