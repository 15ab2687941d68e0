//! Relay configuration, stored as YAML.
//!
//! # Storage layout
//!
//! ```text
//! ~/.shortcut-relay/
//!   config.yaml   (optional, every field has a default)
//! ```
//!
//! Every function takes the home directory explicitly (`fn_at(home, …)`) so
//! tests can point it at a `TempDir`; callers resolve it with [`home_dir`].

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{io_err, ConfigError};

/// Directory under `$HOME` holding config and sockets.
pub const RELAY_DIR: &str = ".shortcut-relay";
pub const CONFIG_FILE: &str = "config.yaml";

pub const DEFAULT_CHANNEL: &str = "com.webdav-sync/shortcuts";
/// Internal deadline for a downstream reply.
pub const DEFAULT_DISPATCH_TIMEOUT_MS: u64 = 25_000;
/// Hard ceiling the OS grants a background-refresh invocation.
pub const DEFAULT_BACKGROUND_CEILING_MS: u64 = 30_000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Method-channel name stamped on every downstream call.
    pub channel: String,
    pub dispatch_timeout_ms: u64,
    pub background_ceiling_ms: u64,
    /// Fallback log filter when `RUST_LOG` is unset.
    pub log_level: String,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            channel: DEFAULT_CHANNEL.to_string(),
            dispatch_timeout_ms: DEFAULT_DISPATCH_TIMEOUT_MS,
            background_ceiling_ms: DEFAULT_BACKGROUND_CEILING_MS,
            log_level: "info".to_string(),
        }
    }
}

impl RelayConfig {
    pub fn dispatch_timeout(&self) -> Duration {
        Duration::from_millis(self.dispatch_timeout_ms)
    }

    pub fn background_ceiling(&self) -> Duration {
        Duration::from_millis(self.background_ceiling_ms)
    }

    /// The internal deadline must fire strictly before the external ceiling,
    /// otherwise a background refresh could end without any reported outcome.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.channel.trim().is_empty() {
            return Err(ConfigError::Invalid("channel must not be empty".to_string()));
        }
        if self.dispatch_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "dispatch_timeout_ms must be greater than zero".to_string(),
            ));
        }
        if self.dispatch_timeout_ms >= self.background_ceiling_ms {
            return Err(ConfigError::Invalid(format!(
                "dispatch_timeout_ms ({}) must be shorter than background_ceiling_ms ({})",
                self.dispatch_timeout_ms, self.background_ceiling_ms
            )));
        }
        Ok(())
    }

    pub fn to_yaml(&self) -> Result<String, ConfigError> {
        Ok(serde_yaml::to_string(self)?)
    }
}

// ---------------------------------------------------------------------------
// Paths
// ---------------------------------------------------------------------------

/// `<home>/.shortcut-relay/`, pure, no I/O.
pub fn relay_root(home: &Path) -> PathBuf {
    home.join(RELAY_DIR)
}

/// `<home>/.shortcut-relay/config.yaml`, pure, no I/O.
pub fn config_path_at(home: &Path) -> PathBuf {
    relay_root(home).join(CONFIG_FILE)
}

// ---------------------------------------------------------------------------
// Load / save
// ---------------------------------------------------------------------------

/// Load the config, falling back to defaults when no file exists.
///
/// Returns `ConfigError::Parse` (with path) if the YAML is malformed.
pub fn load_at(home: &Path) -> Result<RelayConfig, ConfigError> {
    let path = config_path_at(home);
    if !path.exists() {
        return Ok(RelayConfig::default());
    }
    let contents = std::fs::read_to_string(&path).map_err(|e| io_err(&path, e))?;
    if contents.trim().is_empty() {
        return Ok(RelayConfig::default());
    }
    serde_yaml::from_str(&contents).map_err(|source| ConfigError::Parse { path, source })
}

/// Write the config, creating `<home>/.shortcut-relay/` if needed.
pub fn save_at(home: &Path, config: &RelayConfig) -> Result<PathBuf, ConfigError> {
    let root = relay_root(home);
    if !root.exists() {
        std::fs::create_dir_all(&root).map_err(|e| io_err(&root, e))?;
    }
    let path = config_path_at(home);
    std::fs::write(&path, config.to_yaml()?).map_err(|e| io_err(&path, e))?;
    Ok(path)
}

/// `$HOME`, via `dirs::home_dir()`.
pub fn home_dir() -> Result<PathBuf, ConfigError> {
    dirs::home_dir().ok_or(ConfigError::HomeNotFound)
}
