//! `relay trigger` — send one command through the running relay.

use anyhow::{bail, Context, Result};
use clap::Subcommand;
use colored::Colorize;

use relay_core::{Command, FetchOutcome, RelayResult};
use relay_daemon::{request_background_fetch, request_dispatch};

use super::home_dir;

#[derive(Subcommand, Debug)]
pub enum TriggerCommand {
    /// Synchronise every configuration.
    SyncAll,
    /// Synchronise one named configuration.
    SyncConfig {
        /// Configuration name as known to the app.
        name: String,
    },
    /// Ask the app for its sync status (never blocked by a running sync).
    Status,
    /// Run the background-refresh path and print its outcome.
    BackgroundFetch,
}

pub fn run(command: TriggerCommand) -> Result<()> {
    let home = home_dir()?;

    let command = match command {
        TriggerCommand::BackgroundFetch => {
            let outcome = request_background_fetch(&home)
                .context("failed to reach relay daemon (is `relay daemon start` running?)")?;
            return report_fetch(outcome);
        }
        TriggerCommand::SyncAll => Command::sync_all(),
        TriggerCommand::SyncConfig { name } => Command::sync_config(name)?,
        TriggerCommand::Status => Command::get_status(),
    };

    let result = request_dispatch(&home, &command)
        .context("failed to reach relay daemon (is `relay daemon start` running?)")?;
    report(&command, &result)
}

/// Print the result; anything but `Accepted` is an error exit.
pub(crate) fn report(command: &Command, result: &RelayResult) -> Result<()> {
    match result {
        RelayResult::Accepted(message) => {
            println!("{} {command}: {message}", "accepted".green().bold());
            Ok(())
        }
        RelayResult::Rejected(reason) => {
            println!("{} {command}: {reason}", "rejected".yellow().bold());
            bail!("{command} was rejected: {reason}")
        }
        RelayResult::TimedOut => {
            println!("{} {command}", "timed out".yellow().bold());
            bail!("{command} timed out waiting for the app")
        }
        RelayResult::Failed(error) => {
            println!("{} {command}: {error}", "failed".red().bold());
            bail!("{command} failed: {error}")
        }
    }
}

fn report_fetch(outcome: FetchOutcome) -> Result<()> {
    let label = match outcome {
        FetchOutcome::NewData => outcome.as_str().green(),
        FetchOutcome::NoData => outcome.as_str().normal(),
        FetchOutcome::Failed => outcome.as_str().red(),
    };
    println!("background fetch: {label}");
    if outcome == FetchOutcome::Failed {
        bail!("background fetch failed");
    }
    Ok(())
}
