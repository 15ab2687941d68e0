//! Relay core library: command types, relay outcomes, configuration, errors.
//!
//! Public API surface:
//! - [`types`]: commands, parameters, dispatch results
//! - [`error`]: [`CommandError`], [`RelayError`], [`ConfigError`]
//! - [`config`]: YAML configuration load / save / validate
//! - [`intents`]: voice/shortcut intent catalog and phrase matching

pub mod config;
pub mod error;
pub mod intents;
pub mod types;

pub use config::RelayConfig;
pub use error::{CommandError, ConfigError, RelayError};
pub use intents::{IntentAction, ShortcutIntent};
pub use types::{
    Command, CommandName, FetchOutcome, Params, RelayResult, BACKGROUND_FETCH_METHOD,
    SHORTCUT_METHOD,
};
