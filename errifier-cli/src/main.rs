//! Errifier: watch log files and raise a desktop alert when they change.
//!
//! # Usage
//!
//! ```text
//! errifier daemon start|stop|status
//! errifier add <path> --label <name>
//! errifier toggle <id>
//! errifier list [--json]
//! errifier tail <path> [-n <lines>]
//! errifier tail --id <id> [-n <lines>]
//! errifier remove <id>
//! ```

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{
    add::AddArgs, daemon::DaemonCommand, list::ListArgs, remove::RemoveArgs, tail::TailArgs,
    toggle::ToggleArgs,
};

#[derive(Parser, Debug)]
#[command(
    name = "errifier",
    version,
    about = "Watch log files and get notified when they change",
    long_about = None,
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Start, stop, or query the background watcher daemon.
    Daemon {
        #[command(subcommand)]
        command: DaemonCommand,
    },

    /// Start watching a log file under a label.
    Add(AddArgs),

    /// Pause or resume notifications for a watch.
    Toggle(ToggleArgs),

    /// List every watch with its state.
    List(ListArgs),

    /// Print the last lines of a log file.
    Tail(TailArgs),

    /// Stop watching a file.
    Remove(RemoveArgs),
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Daemon { command } => commands::daemon::run(command),
        Commands::Add(args) => args.run(),
        Commands::Toggle(args) => args.run(),
        Commands::List(args) => args.run(),
        Commands::Tail(args) => args.run(),
        Commands::Remove(args) => args.run(),
    }
}
