//! Config load/save/validate integration tests against a temporary home.

use std::fs;

use relay_core::config::{self, config_path_at, RelayConfig, DEFAULT_CHANNEL};
use relay_core::ConfigError;
use tempfile::TempDir;

#[test]
fn missing_config_falls_back_to_defaults() {
    let home = TempDir::new().expect("home");
    let cfg = config::load_at(home.path()).expect("load");
    assert_eq!(cfg, RelayConfig::default());
    assert_eq!(cfg.channel, DEFAULT_CHANNEL);
    assert_eq!(cfg.dispatch_timeout().as_secs(), 25);
    assert_eq!(cfg.background_ceiling().as_secs(), 30);
    cfg.validate().expect("defaults are valid");
}

#[test]
fn save_then_load_preserves_overrides() {
    let home = TempDir::new().expect("home");
    let cfg = RelayConfig {
        dispatch_timeout_ms: 5_000,
        log_level: "debug".to_string(),
        ..RelayConfig::default()
    };
    let path = config::save_at(home.path(), &cfg).expect("save");
    assert_eq!(path, config_path_at(home.path()));
    assert!(path.exists());

    let loaded = config::load_at(home.path()).expect("load");
    assert_eq!(loaded, cfg);
}

#[test]
fn partial_yaml_fills_remaining_fields_with_defaults() {
    let home = TempDir::new().expect("home");
    let path = config_path_at(home.path());
    fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
    fs::write(&path, "dispatch_timeout_ms: 1000\n").expect("write");

    let cfg = config::load_at(home.path()).expect("load");
    assert_eq!(cfg.dispatch_timeout_ms, 1_000);
    assert_eq!(cfg.channel, DEFAULT_CHANNEL);
    assert_eq!(cfg.log_level, "info");
}

#[test]
fn corrupt_yaml_returns_parse_error_with_path() {
    let home = TempDir::new().expect("home");
    let path = config_path_at(home.path());
    fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
    fs::write(&path, b": : corrupt : yaml : !!!\n  - broken: [unclosed").expect("write");

    let err = config::load_at(home.path()).unwrap_err();
    assert!(matches!(err, ConfigError::Parse { .. }), "got: {err}");
    assert!(err.to_string().contains("config.yaml"), "got: {err}");
}

#[test]
fn timeout_must_stay_under_background_ceiling() {
    let at_ceiling = RelayConfig {
        dispatch_timeout_ms: 30_000,
        ..RelayConfig::default()
    };
    let err = at_ceiling.validate().unwrap_err();
    assert!(matches!(err, ConfigError::Invalid(_)), "got: {err}");
    assert!(err.to_string().contains("shorter than"));

    let zero = RelayConfig {
        dispatch_timeout_ms: 0,
        ..RelayConfig::default()
    };
    assert!(zero.validate().is_err());

    let blank_channel = RelayConfig {
        channel: "  ".to_string(),
        ..RelayConfig::default()
    };
    assert!(blank_channel.validate().is_err());
}
