//! Voice/shortcut intents and the phrases that trigger them.
//!
//! Phrases may contain two placeholders: `{app}` (replaced by the
//! application name before matching) and `{configName}` (captures the
//! configuration to synchronise). Matching ignores case and collapses
//! whitespace. Literal phrases are tried before parameterized ones so that
//! "Alle synchronisieren" never resolves to a config named "Alle".

use crate::error::CommandError;
use crate::types::{Command, CommandName, RelayResult};

const APP_PLACEHOLDER: &str = "{app}";
const CONFIG_PLACEHOLDER: &str = "{configName}";

/// Spoken reply when a sync is already in flight.
pub const BUSY_REPLY: &str = "Sync läuft bereits.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntentAction {
    /// Forward a command through the relay.
    Dispatch(CommandName),
    /// Bring the app to the foreground; nothing is forwarded.
    OpenApp,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShortcutIntent {
    pub id: &'static str,
    pub title: &'static str,
    pub description: &'static str,
    pub phrases: &'static [&'static str],
    /// Whether invoking the intent launches the app UI.
    pub opens_app: bool,
    pub action: IntentAction,
}

static CATALOG: [ShortcutIntent; 4] = [
    ShortcutIntent {
        id: "SyncAllConfigsIntent",
        title: "Alle synchronisieren",
        description: "Synchronisiert alle WebDAV-Konfigurationen nacheinander.",
        phrases: &[
            "Alle synchronisieren",
            "WebDAV synchronisieren",
            "Alle synchronisieren in {app}",
            "WebDAV synchronisieren in {app}",
        ],
        opens_app: false,
        action: IntentAction::Dispatch(CommandName::SyncAll),
    },
    ShortcutIntent {
        id: "SyncConfigIntent",
        title: "Konfiguration synchronisieren",
        description: "Synchronisiert eine bestimmte WebDAV-Konfiguration.",
        phrases: &["{configName} synchronisieren", "{configName} synchronisieren in {app}"],
        opens_app: false,
        action: IntentAction::Dispatch(CommandName::SyncConfig),
    },
    ShortcutIntent {
        id: "GetSyncStatusIntent",
        title: "Sync-Status anzeigen",
        description: "Zeigt den aktuellen Synchronisationsstatus an.",
        phrases: &["WebDAV Status", "Sync-Status"],
        opens_app: false,
        action: IntentAction::Dispatch(CommandName::GetStatus),
    },
    ShortcutIntent {
        id: "OpenAppIntent",
        title: "App öffnen",
        description: "Öffnet die WebDAV Sync App.",
        phrases: &["Öffne {app}", "{app} öffnen"],
        opens_app: true,
        action: IntentAction::OpenApp,
    },
];

pub fn catalog() -> &'static [ShortcutIntent] {
    &CATALOG
}

pub fn find(id: &str) -> Option<&'static ShortcutIntent> {
    CATALOG.iter().find(|intent| intent.id == id)
}

impl ShortcutIntent {
    /// Build the relay command for this intent. `None` for [`IntentAction::OpenApp`].
    pub fn command(&self, config_name: Option<&str>) -> Result<Option<Command>, CommandError> {
        let command = match self.action {
            IntentAction::OpenApp => return Ok(None),
            IntentAction::Dispatch(CommandName::SyncAll) => Command::sync_all(),
            IntentAction::Dispatch(CommandName::SyncConfig) => {
                Command::sync_config(config_name.unwrap_or_default())?
            }
            IntentAction::Dispatch(CommandName::GetStatus) => Command::get_status(),
            IntentAction::Dispatch(CommandName::BackgroundFetch) => Command::background_fetch(),
        };
        Ok(Some(command))
    }

    /// Phrases with `{app}` substituted, for display.
    pub fn rendered_phrases(&self, app_name: &str) -> Vec<String> {
        self.phrases
            .iter()
            .map(|phrase| phrase.replace(APP_PLACEHOLDER, app_name))
            .collect()
    }
}

/// A spoken phrase resolved to an intent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhraseMatch {
    pub intent: &'static ShortcutIntent,
    pub config_name: Option<String>,
}

impl PhraseMatch {
    pub fn command(&self) -> Result<Option<Command>, CommandError> {
        self.intent.command(self.config_name.as_deref())
    }
}

/// Resolve a spoken phrase against the catalog.
pub fn match_phrase(spoken: &str, app_name: &str) -> Option<PhraseMatch> {
    let spoken = normalize(spoken);
    if spoken.is_empty() {
        return None;
    }

    let templates = || {
        CATALOG.iter().flat_map(|intent| {
            intent
                .phrases
                .iter()
                .map(move |phrase| (intent, normalize(&phrase.replace(APP_PLACEHOLDER, app_name))))
        })
    };

    for (intent, phrase) in templates().filter(|(_, p)| !p.contains(CONFIG_PLACEHOLDER)) {
        if strip_prefix_ci(&spoken, &phrase).is_some_and(str::is_empty) {
            return Some(PhraseMatch {
                intent,
                config_name: None,
            });
        }
    }

    for (intent, phrase) in templates() {
        let Some((prefix, suffix)) = phrase.split_once(CONFIG_PLACEHOLDER) else {
            continue;
        };
        let Some(rest) = strip_prefix_ci(&spoken, prefix) else {
            continue;
        };
        let Some(captured) = strip_suffix_ci(rest, suffix) else {
            continue;
        };
        let captured = captured.trim();
        if !captured.is_empty() {
            return Some(PhraseMatch {
                intent,
                config_name: Some(captured.to_string()),
            });
        }
    }

    None
}

/// What a voice assistant should say back for a relay result.
pub fn spoken_reply(result: &RelayResult) -> String {
    match result {
        RelayResult::Accepted(message) => message.clone(),
        RelayResult::Rejected(_) => BUSY_REPLY.to_string(),
        RelayResult::TimedOut => "Die App hat nicht rechtzeitig geantwortet.".to_string(),
        RelayResult::Failed(error) => format!("Fehler: {error}"),
    }
}

fn normalize(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn chars_match(a: char, b: char) -> bool {
    a.to_lowercase().eq(b.to_lowercase())
}

fn strip_prefix_ci<'a>(text: &'a str, prefix: &str) -> Option<&'a str> {
    let mut rest = text.chars();
    for expected in prefix.chars() {
        if !chars_match(rest.next()?, expected) {
            return None;
        }
    }
    Some(rest.as_str())
}

fn strip_suffix_ci<'a>(text: &'a str, suffix: &str) -> Option<&'a str> {
    let mut end = text.len();
    let mut chars = text.char_indices().rev();
    for expected in suffix.chars().rev() {
        let (index, actual) = chars.next()?;
        if !chars_match(actual, expected) {
            return None;
        }
        end = index;
    }
    Some(&text[..end])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefix_and_suffix_ignore_case_across_umlauts() {
        assert_eq!(strip_prefix_ci("ÖFFNE Sync", "öffne "), Some("Sync"));
        assert_eq!(strip_suffix_ci("Photos SYNCHRONISIEREN", " synchronisieren"), Some("Photos"));
        assert_eq!(strip_prefix_ci("Öf", "öffne"), None);
    }

    #[test]
    fn catalog_ids_are_unique() {
        let mut ids: Vec<_> = catalog().iter().map(|intent| intent.id).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), catalog().len());
    }
}
