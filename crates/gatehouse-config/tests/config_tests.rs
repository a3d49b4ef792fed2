// SPDX-FileCopyrightText: 2026 Gatehouse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration tests for the Gatehouse configuration system.

use gatehouse_config::diagnostic::ConfigError;
use gatehouse_config::model::GatehouseConfig;
use gatehouse_config::{load_and_validate_str, load_config_from_str};

#[test]
fn valid_toml_deserializes_into_config() {
    let toml = r#"
[daemon]
log_level = "debug"
restore_sessions = false

[storage]
database_path = "/tmp/gatehouse-test.db"

[session]
max_reconnect_attempts = 7
reconnect_delay_ms = 1500
max_restart_attempts = 2

[reconciler]
cleanup_interval_secs = 60
stale_timeout_secs = 3600

[bot]
greetings = ["hey"]
currency = "USD"

[gateway]
port = 8088
bearer_token = "secret"
"#;

    let config = load_config_from_str(toml).expect("valid TOML should deserialize");
    assert_eq!(config.daemon.log_level, "debug");
    assert!(!config.daemon.restore_sessions);
    assert_eq!(config.storage.database_path, "/tmp/gatehouse-test.db");
    assert_eq!(config.session.max_reconnect_attempts, 7);
    assert_eq!(config.session.reconnect_delay_ms, 1500);
    assert_eq!(config.session.max_restart_attempts, 2);
    assert_eq!(config.reconciler.cleanup_interval_secs, 60);
    assert_eq!(config.reconciler.stale_timeout_secs, 3600);
    assert_eq!(config.bot.greetings, vec!["hey"]);
    assert_eq!(config.bot.currency, "USD");
    assert_eq!(config.gateway.port, 8088);
    assert_eq!(config.gateway.bearer_token.as_deref(), Some("secret"));
}

#[test]
fn empty_toml_uses_defaults() {
    let config = load_config_from_str("").unwrap();
    let defaults = GatehouseConfig::default();
    assert_eq!(
        config.session.max_reconnect_attempts,
        defaults.session.max_reconnect_attempts
    );
    assert_eq!(config.session.max_reconnect_attempts, 5);
    assert_eq!(config.reconciler.stale_timeout_secs, 86_400);
    assert_eq!(config.bot.greetings, vec!["hi", "hello", "halo"]);
    assert_eq!(config.transport.backend, "loopback");
}

#[test]
fn unknown_key_gets_suggestion() {
    let toml = r#"
[session]
max_reconect_attempts = 3
"#;

    let errors = load_and_validate_str(toml).expect_err("unknown key must be rejected");
    assert_eq!(errors.len(), 1);
    match &errors[0] {
        ConfigError::UnknownKey {
            key, suggestion, ..
        } => {
            assert_eq!(key, "session.max_reconect_attempts");
            assert_eq!(suggestion.as_deref(), Some("max_reconnect_attempts"));
        }
        other => panic!("expected UnknownKey, got {other:?}"),
    }
}

#[test]
fn unknown_section_is_rejected() {
    let errors = load_and_validate_str("[telemetry]\nenabled = true\n").unwrap_err();
    assert!(matches!(errors[0], ConfigError::UnknownKey { .. }));
}

#[test]
fn wrong_type_is_reported_with_key() {
    let toml = r#"
[session]
max_reconnect_attempts = "many"
"#;
    let errors = load_and_validate_str(toml).unwrap_err();
    match &errors[0] {
        ConfigError::InvalidType { key, .. } => {
            assert!(key.contains("max_reconnect_attempts"), "key was {key}")
        }
        other => panic!("expected InvalidType, got {other:?}"),
    }
}

#[test]
fn semantic_errors_are_collected() {
    let toml = r#"
[reconciler]
cleanup_interval_secs = 0
stale_timeout_secs = 0
"#;
    let errors = load_and_validate_str(toml).unwrap_err();
    assert_eq!(errors.len(), 2);
    assert!(
        errors
            .iter()
            .all(|e| matches!(e, ConfigError::Validation { .. }))
    );
}

#[test]
fn env_overrides_file_values() {
    figment::Jail::expect_with(|jail| {
        let path = jail.directory().join("gatehouse.toml");
        jail.create_file(
            "gatehouse.toml",
            "[session]\nmax_reconnect_attempts = 2\n",
        )?;
        jail.set_env("GATEHOUSE_SESSION_MAX_RECONNECT_ATTEMPTS", "9");
        jail.set_env("GATEHOUSE_GATEWAY_BEARER_TOKEN", "from-env");

        let config = gatehouse_config::load_config_from_path(&path)?;
        assert_eq!(config.session.max_reconnect_attempts, 9);
        assert_eq!(config.gateway.bearer_token.as_deref(), Some("from-env"));
        Ok(())
    });
}

#[test]
fn config_serializes_back_to_toml() {
    let config = GatehouseConfig::default();
    let rendered = toml::to_string(&config).expect("config must serialize");
    let reparsed = load_config_from_str(&rendered).expect("rendered config must parse");
    assert_eq!(reparsed.gateway.port, config.gateway.port);
    assert_eq!(reparsed.bot.fallback_text, config.bot.fallback_text);
}
