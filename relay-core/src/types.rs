//! Domain types for the command relay.
//!
//! A [`Command`] is built once, validated against its [`CommandName`], and
//! never mutated afterwards. Dispatching it yields a [`RelayResult`]; the
//! background-refresh path additionally collapses replies into a
//! [`FetchOutcome`].

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::{CommandError, RelayError};

/// Downstream method carrying every shortcut command.
pub const SHORTCUT_METHOD: &str = "handleShortcutCommand";

/// Downstream method invoked by the OS background-refresh callback.
pub const BACKGROUND_FETCH_METHOD: &str = "handleBackgroundFetch";

/// Parameter name required by [`CommandName::SyncConfig`].
pub const CONFIG_NAME_PARAM: &str = "configName";

/// Command parameters. Only string values are used by trigger sources.
pub type Params = BTreeMap<String, String>;

// ---------------------------------------------------------------------------
// Command names
// ---------------------------------------------------------------------------

/// The closed set of commands the relay forwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CommandName {
    #[serde(rename = "syncall")]
    SyncAll,
    #[serde(rename = "syncconfig")]
    SyncConfig,
    #[serde(rename = "getstatus")]
    GetStatus,
    #[serde(rename = "handleBackgroundFetch")]
    BackgroundFetch,
}

impl CommandName {
    pub const ALL: [CommandName; 4] = [
        CommandName::SyncAll,
        CommandName::SyncConfig,
        CommandName::GetStatus,
        CommandName::BackgroundFetch,
    ];

    /// Wire name, as sent by trigger sources.
    pub fn as_str(self) -> &'static str {
        match self {
            CommandName::SyncAll => "syncall",
            CommandName::SyncConfig => "syncconfig",
            CommandName::GetStatus => "getstatus",
            CommandName::BackgroundFetch => BACKGROUND_FETCH_METHOD,
        }
    }

    pub fn required_params(self) -> &'static [&'static str] {
        match self {
            CommandName::SyncConfig => &[CONFIG_NAME_PARAM],
            _ => &[],
        }
    }

    /// Downstream method this command is delivered through.
    pub fn method(self) -> &'static str {
        match self {
            CommandName::BackgroundFetch => BACKGROUND_FETCH_METHOD,
            _ => SHORTCUT_METHOD,
        }
    }
}

impl fmt::Display for CommandName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CommandName {
    type Err = CommandError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CommandName::ALL
            .into_iter()
            .find(|name| name.as_str() == s)
            .ok_or_else(|| CommandError::UnknownCommand(s.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Command
// ---------------------------------------------------------------------------

/// A named operation plus its parameters. Immutable once constructed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Command {
    name: CommandName,
    params: Params,
}

impl Command {
    /// Build a command, rejecting missing or empty required parameters.
    pub fn new(name: CommandName, params: Params) -> Result<Self, CommandError> {
        for &param in name.required_params() {
            let present = params
                .get(param)
                .map(|value| !value.trim().is_empty())
                .unwrap_or(false);
            if !present {
                return Err(CommandError::MissingParam {
                    command: name.as_str(),
                    param,
                });
            }
        }
        Ok(Self { name, params })
    }

    /// Parse a wire name and build the command.
    pub fn parse(name: &str, params: Params) -> Result<Self, CommandError> {
        Self::new(name.parse()?, params)
    }

    pub fn sync_all() -> Self {
        Self {
            name: CommandName::SyncAll,
            params: Params::new(),
        }
    }

    pub fn sync_config(config_name: impl Into<String>) -> Result<Self, CommandError> {
        let mut params = Params::new();
        params.insert(CONFIG_NAME_PARAM.to_string(), config_name.into());
        Self::new(CommandName::SyncConfig, params)
    }

    pub fn get_status() -> Self {
        Self {
            name: CommandName::GetStatus,
            params: Params::new(),
        }
    }

    pub fn background_fetch() -> Self {
        Self {
            name: CommandName::BackgroundFetch,
            params: Params::new(),
        }
    }

    pub fn name(&self) -> CommandName {
        self.name
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    pub fn method(&self) -> &'static str {
        self.name.method()
    }

    /// Arguments for the downstream call.
    ///
    /// Shortcut commands travel as `{"command": .., "params": {..}}`;
    /// background fetch carries no arguments.
    pub fn arguments(&self) -> Value {
        match self.name {
            CommandName::BackgroundFetch => Value::Null,
            name => json!({
                "command": name.as_str(),
                "params": self.params,
            }),
        }
    }

    /// Acknowledgement used when the downstream reply carries no message.
    pub fn acknowledgement(&self) -> String {
        match self.name {
            CommandName::SyncAll => "Alle Konfigurationen werden synchronisiert...".to_string(),
            CommandName::SyncConfig => format!(
                "Synchronisiere '{}'...",
                self.param(CONFIG_NAME_PARAM).unwrap_or_default()
            ),
            CommandName::GetStatus => "Status wird abgerufen...".to_string(),
            CommandName::BackgroundFetch => "Hintergrundaktualisierung abgeschlossen.".to_string(),
        }
    }

    /// Human-readable message for a downstream reply: the reply itself when it
    /// is a string, its `message` field when it is a mapping, else the default
    /// acknowledgement.
    pub fn reply_message(&self, reply: Option<&Value>) -> String {
        let message = match reply {
            Some(Value::String(text)) => Some(text.as_str()),
            Some(Value::Object(map)) => map.get("message").and_then(Value::as_str),
            _ => None,
        };
        match message {
            Some(text) if !text.trim().is_empty() => text.to_string(),
            _ => self.acknowledgement(),
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name.as_str())?;
        if !self.params.is_empty() {
            let rendered: Vec<String> = self
                .params
                .iter()
                .map(|(key, value)| format!("{key}={value}"))
                .collect();
            write!(f, "({})", rendered.join(", "))?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Outcomes
// ---------------------------------------------------------------------------

/// Outcome of a dispatch attempt, as seen by the trigger source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum RelayResult {
    Accepted(String),
    Rejected(String),
    TimedOut,
    Failed(String),
}

impl RelayResult {
    pub fn is_accepted(&self) -> bool {
        matches!(self, RelayResult::Accepted(_))
    }

    pub fn label(&self) -> &'static str {
        match self {
            RelayResult::Accepted(_) => "accepted",
            RelayResult::Rejected(_) => "rejected",
            RelayResult::TimedOut => "timed_out",
            RelayResult::Failed(_) => "failed",
        }
    }

    pub fn detail(&self) -> Option<&str> {
        match self {
            RelayResult::Accepted(text) | RelayResult::Rejected(text) | RelayResult::Failed(text) => {
                Some(text.as_str())
            }
            RelayResult::TimedOut => None,
        }
    }
}

impl From<RelayError> for RelayResult {
    fn from(err: RelayError) -> Self {
        match err {
            RelayError::AlreadyBusy => RelayResult::Rejected(err.to_string()),
            RelayError::Timeout { .. } => RelayResult::TimedOut,
            RelayError::HandlerUnavailable | RelayError::Downstream(_) => {
                RelayResult::Failed(err.to_string())
            }
        }
    }
}

impl fmt::Display for RelayResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.detail() {
            Some(detail) => write!(f, "{}: {detail}", self.label()),
            None => f.write_str(self.label()),
        }
    }
}

/// Result reported to the OS background-refresh callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchOutcome {
    NewData,
    NoData,
    Failed,
}

impl FetchOutcome {
    /// Only a reply mapping with `success: true` counts as new data. Absent
    /// replies, errors and anything else collapse to `NoData`.
    pub fn from_reply(reply: Option<&Value>) -> Self {
        let success = reply
            .and_then(|value| value.get("success"))
            .and_then(Value::as_bool)
            .unwrap_or(false);
        if success {
            FetchOutcome::NewData
        } else {
            FetchOutcome::NoData
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            FetchOutcome::NewData => "new_data",
            FetchOutcome::NoData => "no_data",
            FetchOutcome::Failed => "failed",
        }
    }
}

impl fmt::Display for FetchOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_names_round_trip_through_wire_strings() {
        for name in CommandName::ALL {
            assert_eq!(name.as_str().parse::<CommandName>(), Ok(name));
        }
        assert_eq!(
            "syncEverything".parse::<CommandName>(),
            Err(CommandError::UnknownCommand("syncEverything".into()))
        );
    }

    #[test]
    fn sync_config_requires_non_empty_config_name() {
        let err = Command::new(CommandName::SyncConfig, Params::new()).unwrap_err();
        assert_eq!(
            err,
            CommandError::MissingParam {
                command: "syncconfig",
                param: "configName"
            }
        );
        assert!(Command::sync_config("   ").is_err());
        let cmd = Command::sync_config("Photos").expect("valid");
        assert_eq!(cmd.param("configName"), Some("Photos"));
    }

    #[test]
    fn shortcut_arguments_wrap_command_and_params() {
        let cmd = Command::sync_config("Photos").expect("valid");
        assert_eq!(cmd.method(), SHORTCUT_METHOD);
        assert_eq!(
            cmd.arguments(),
            json!({"command": "syncconfig", "params": {"configName": "Photos"}})
        );
        assert_eq!(
            Command::sync_all().arguments(),
            json!({"command": "syncall", "params": {}})
        );
    }

    #[test]
    fn background_fetch_has_no_arguments() {
        let cmd = Command::background_fetch();
        assert_eq!(cmd.method(), BACKGROUND_FETCH_METHOD);
        assert_eq!(cmd.arguments(), Value::Null);
    }

    #[test]
    fn reply_message_prefers_downstream_text() {
        let cmd = Command::sync_all();
        assert_eq!(cmd.reply_message(Some(&json!("ok, running"))), "ok, running");
        assert_eq!(
            cmd.reply_message(Some(&json!({"message": "3 configs queued"}))),
            "3 configs queued"
        );
        assert_eq!(
            cmd.reply_message(None),
            "Alle Konfigurationen werden synchronisiert..."
        );
        assert_eq!(
            Command::sync_config("Photos")
                .expect("valid")
                .reply_message(Some(&json!({"success": true}))),
            "Synchronisiere 'Photos'..."
        );
    }

    #[test]
    fn relay_errors_map_onto_results() {
        assert_eq!(
            RelayResult::from(RelayError::AlreadyBusy),
            RelayResult::Rejected("already busy".into())
        );
        assert_eq!(
            RelayResult::from(RelayError::HandlerUnavailable),
            RelayResult::Failed("handler unavailable".into())
        );
        assert_eq!(
            RelayResult::from(RelayError::Timeout {
                after: std::time::Duration::from_secs(25)
            }),
            RelayResult::TimedOut
        );
    }

    #[test]
    fn relay_result_serializes_with_status_tag() {
        let accepted = serde_json::to_value(RelayResult::Accepted("hi".into())).expect("encode");
        assert_eq!(accepted, json!({"status": "accepted", "detail": "hi"}));
        let timed_out = serde_json::to_value(RelayResult::TimedOut).expect("encode");
        assert_eq!(timed_out, json!({"status": "timed_out"}));
        let decoded: RelayResult = serde_json::from_value(timed_out).expect("decode");
        assert_eq!(decoded, RelayResult::TimedOut);
    }

    #[test]
    fn fetch_outcome_collapses_everything_but_explicit_success() {
        assert_eq!(
            FetchOutcome::from_reply(Some(&json!({"success": true}))),
            FetchOutcome::NewData
        );
        assert_eq!(
            FetchOutcome::from_reply(Some(&json!({"success": false}))),
            FetchOutcome::NoData
        );
        assert_eq!(
            FetchOutcome::from_reply(Some(&json!({"success": "true"}))),
            FetchOutcome::NoData
        );
        assert_eq!(
            FetchOutcome::from_reply(Some(&json!({"error": "boom"}))),
            FetchOutcome::NoData
        );
        assert_eq!(FetchOutcome::from_reply(None), FetchOutcome::NoData);
    }
}
