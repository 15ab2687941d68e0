//! CLI subcommand implementations.

pub mod config;
pub mod daemon;
pub mod shortcut;
pub mod trigger;

use std::path::PathBuf;

use anyhow::{Context, Result};

pub(crate) fn home_dir() -> Result<PathBuf> {
    relay_core::config::home_dir().context("could not determine home directory")
}
