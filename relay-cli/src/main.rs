//! Shortcut relay: trigger-side CLI for the single-flight command relay.
//!
//! # Usage
//!
//! ```text
//! relay daemon start|stop|status
//! relay trigger sync-all|sync-config <name>|status|background-fetch
//! relay shortcut "<phrase>" [--app-name <name>] [--dry-run]
//! relay shortcuts [--app-name <name>]
//! relay config show|init [--force]
//! ```

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{
    config::ConfigCommand,
    daemon::DaemonCommand,
    shortcut::{ShortcutArgs, ShortcutsArgs},
    trigger::TriggerCommand,
};

#[derive(Parser, Debug)]
#[command(
    name = "relay",
    version,
    about = "Forward shortcut and background-refresh commands to the managed app, one at a time",
    long_about = None,
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run or query the relay daemon.
    Daemon {
        #[command(subcommand)]
        command: DaemonCommand,
    },

    /// Send a command through the running relay.
    Trigger {
        #[command(subcommand)]
        command: TriggerCommand,
    },

    /// Resolve a spoken phrase to a shortcut intent and trigger it.
    Shortcut(ShortcutArgs),

    /// List the shortcut intents and their phrases.
    Shortcuts(ShortcutsArgs),

    /// Inspect or create the relay configuration.
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Daemon { command } => commands::daemon::run(command),
        Commands::Trigger { command } => commands::trigger::run(command),
        Commands::Shortcut(args) => args.run(),
        Commands::Shortcuts(args) => args.run(),
        Commands::Config { command } => commands::config::run(command),
    }
}
