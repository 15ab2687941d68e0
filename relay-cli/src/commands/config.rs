//! `relay config` — show or create `~/.shortcut-relay/config.yaml`.

use anyhow::{bail, Context, Result};
use clap::Subcommand;

use relay_core::config::{self, config_path_at};
use relay_core::RelayConfig;

use super::home_dir;

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Print the effective configuration (defaults when no file exists).
    Show,
    /// Write a config file populated with defaults.
    Init {
        /// Overwrite an existing config file.
        #[arg(long)]
        force: bool,
    },
}

pub fn run(command: ConfigCommand) -> Result<()> {
    let home = home_dir()?;
    let path = config_path_at(&home);

    match command {
        ConfigCommand::Show => {
            let cfg = config::load_at(&home).context("failed to load relay config")?;
            if let Err(err) = cfg.validate() {
                eprintln!("warning: {err}");
            }
            println!("# {}", path.display());
            print!("{}", cfg.to_yaml()?);
        }
        ConfigCommand::Init { force } => {
            if path.exists() && !force {
                bail!(
                    "config already exists at {} (use --force to overwrite)",
                    path.display()
                );
            }
            let written = config::save_at(&home, &RelayConfig::default())
                .context("failed to write relay config")?;
            println!("wrote {}", written.display());
        }
    }

    Ok(())
}
