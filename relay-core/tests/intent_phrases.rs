//! Phrase resolution against the shortcut intent catalog.

use relay_core::intents::{self, match_phrase, spoken_reply, BUSY_REPLY};
use relay_core::{Command, CommandName, IntentAction, RelayResult};
use rstest::rstest;

const APP: &str = "WebDAV Sync";

#[rstest]
#[case("Alle synchronisieren", "SyncAllConfigsIntent")]
#[case("  webdav   SYNCHRONISIEREN ", "SyncAllConfigsIntent")]
#[case("Alle synchronisieren in WebDAV Sync", "SyncAllConfigsIntent")]
#[case("WebDAV Status", "GetSyncStatusIntent")]
#[case("sync-status", "GetSyncStatusIntent")]
#[case("Öffne WebDAV Sync", "OpenAppIntent")]
#[case("webdav sync öffnen", "OpenAppIntent")]
fn literal_phrases_resolve_to_intents(#[case] spoken: &str, #[case] expected: &str) {
    let matched = match_phrase(spoken, APP).expect("phrase should match");
    assert_eq!(matched.intent.id, expected);
    assert_eq!(matched.config_name, None);
}

#[rstest]
#[case("Photos synchronisieren", "Photos")]
#[case("Meine Dokumente synchronisieren", "Meine Dokumente")]
#[case("Backup synchronisieren in WebDAV Sync", "Backup")]
fn parameterized_phrase_captures_config_name(#[case] spoken: &str, #[case] config: &str) {
    let matched = match_phrase(spoken, APP).expect("phrase should match");
    assert_eq!(matched.intent.id, "SyncConfigIntent");
    assert_eq!(matched.config_name.as_deref(), Some(config));

    let command = matched.command().expect("valid").expect("dispatches");
    assert_eq!(command.name(), CommandName::SyncConfig);
    assert_eq!(command.param("configName"), Some(config));
}

#[rstest]
#[case("")]
#[case("synchronisieren")]
#[case("Wetter morgen")]
fn unknown_phrases_do_not_match(#[case] spoken: &str) {
    assert!(match_phrase(spoken, APP).is_none(), "unexpected match for {spoken:?}");
}

#[test]
fn open_app_intent_dispatches_nothing() {
    let intent = intents::find("OpenAppIntent").expect("catalogued");
    assert!(intent.opens_app);
    assert_eq!(intent.action, IntentAction::OpenApp);
    assert_eq!(intent.command(None).expect("no error"), None);
}

#[test]
fn sync_intents_stay_in_background() {
    for intent in intents::catalog() {
        if let IntentAction::Dispatch(_) = intent.action {
            assert!(!intent.opens_app, "{} should not open the app", intent.id);
        }
    }
}

#[test]
fn sync_config_intent_without_name_is_rejected() {
    let intent = intents::find("SyncConfigIntent").expect("catalogued");
    assert!(intent.command(None).is_err());
}

#[test]
fn rendered_phrases_substitute_app_name() {
    let intent = intents::find("OpenAppIntent").expect("catalogued");
    assert_eq!(
        intent.rendered_phrases("Sync"),
        vec!["Öffne Sync".to_string(), "Sync öffnen".to_string()]
    );
}

#[test]
fn spoken_reply_voices_busy_rejection() {
    let accepted = RelayResult::Accepted(Command::sync_all().acknowledgement());
    assert_eq!(
        spoken_reply(&accepted),
        "Alle Konfigurationen werden synchronisiert..."
    );
    assert_eq!(
        spoken_reply(&RelayResult::Rejected("already busy".into())),
        BUSY_REPLY
    );
}
