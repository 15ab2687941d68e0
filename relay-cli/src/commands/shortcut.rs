//! `relay shortcut` / `relay shortcuts` — voice-phrase resolution.

use anyhow::{anyhow, Context, Result};
use clap::Args;
use colored::Colorize;
use tabled::{settings::Style, Table, Tabled};

use relay_core::intents::{self, match_phrase, spoken_reply};
use relay_daemon::request_dispatch;

use super::home_dir;

const DEFAULT_APP_NAME: &str = "WebDAV Sync";

/// Arguments for `relay shortcut`.
#[derive(Args, Debug)]
pub struct ShortcutArgs {
    /// The phrase as spoken or typed, e.g. "Photos synchronisieren".
    pub phrase: String,

    /// Application name substituted into `{app}` phrases.
    #[arg(long, default_value = DEFAULT_APP_NAME)]
    pub app_name: String,

    /// Resolve the phrase and print the command without dispatching it.
    #[arg(long)]
    pub dry_run: bool,
}

impl ShortcutArgs {
    pub fn run(self) -> Result<()> {
        let matched = match_phrase(&self.phrase, &self.app_name)
            .ok_or_else(|| anyhow!("no shortcut matches '{}'", self.phrase))?;
        let intent = matched.intent;

        let Some(command) = matched.command()? else {
            println!("{} {}: opening {}", "intent".bold(), intent.id, self.app_name);
            return Ok(());
        };

        if self.dry_run {
            println!("{} {} -> {command}", "intent".bold(), intent.id);
            return Ok(());
        }

        let home = home_dir()?;
        let result = request_dispatch(&home, &command)
            .context("failed to reach relay daemon (is `relay daemon start` running?)")?;
        println!("{}", spoken_reply(&result));
        super::trigger::report(&command, &result)
    }
}

/// Arguments for `relay shortcuts`.
#[derive(Args, Debug)]
pub struct ShortcutsArgs {
    /// Application name substituted into `{app}` phrases.
    #[arg(long, default_value = DEFAULT_APP_NAME)]
    pub app_name: String,
}

#[derive(Tabled)]
struct IntentRow {
    #[tabled(rename = "intent")]
    id: &'static str,
    #[tabled(rename = "title")]
    title: &'static str,
    #[tabled(rename = "phrases")]
    phrases: String,
    #[tabled(rename = "opens app")]
    opens_app: &'static str,
}

impl ShortcutsArgs {
    pub fn run(self) -> Result<()> {
        let rows: Vec<IntentRow> = intents::catalog()
            .iter()
            .map(|intent| IntentRow {
                id: intent.id,
                title: intent.title,
                phrases: intent.rendered_phrases(&self.app_name).join("\n"),
                opens_app: if intent.opens_app { "yes" } else { "no" },
            })
            .collect();

        let mut table = Table::new(rows);
        table.with(Style::rounded());
        println!("{table}");
        Ok(())
    }
}
