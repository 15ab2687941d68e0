//! Error types for relay-core.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Errors raised while building a [`crate::Command`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    /// The command name is not one of the known relay commands.
    #[error("unknown command '{0}'")]
    UnknownCommand(String),

    /// A required parameter is absent or empty.
    #[error("command '{command}' requires parameter '{param}'")]
    MissingParam {
        command: &'static str,
        param: &'static str,
    },
}

/// Terminal failure of a single dispatch attempt.
///
/// None of these poison the relay: the busy flag is released on every path.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RelayError {
    /// Another command is in flight. Recoverable; the caller may retry.
    #[error("already busy")]
    AlreadyBusy,

    /// No downstream handler is reachable (managed application not initialized).
    #[error("handler unavailable")]
    HandlerUnavailable,

    /// The downstream handler did not reply before the deadline.
    #[error("no reply within {}ms", after.as_millis())]
    Timeout { after: Duration },

    /// The downstream handler reported an error.
    #[error("downstream error: {0}")]
    Downstream(String),
}

/// All errors that can arise from configuration handling.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// YAML serialization error (save path).
    #[error("YAML serialization error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// YAML parse error on load, with file path.
    #[error("failed to parse config at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// `dirs::home_dir()` returned `None`.
    #[error("cannot determine home directory; set $HOME or equivalent")]
    HomeNotFound,

    /// The configuration loaded but violates a constraint.
    #[error("invalid config: {0}")]
    Invalid(String),
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> ConfigError {
    ConfigError::Io {
        path: path.into(),
        source,
    }
}
