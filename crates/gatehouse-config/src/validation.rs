// SPDX-FileCopyrightText: 2026 Gatehouse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Validates semantic constraints that serde attributes cannot express.
//! All errors are collected; validation never fails fast.

use crate::diagnostic::ConfigError;
use crate::model::GatehouseConfig;

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

pub fn validate_config(config: &GatehouseConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    if !LOG_LEVELS.contains(&config.daemon.log_level.as_str()) {
        errors.push(ConfigError::validation(format!(
            "daemon.log_level must be one of {}, got `{}`",
            LOG_LEVELS.join(", "),
            config.daemon.log_level
        )));
    }

    if config.storage.database_path.trim().is_empty() {
        errors.push(ConfigError::validation(
            "storage.database_path must not be empty",
        ));
    }

    let session = &config.session;
    if session.qr_wait_attempts == 0 {
        errors.push(ConfigError::validation(
            "session.qr_wait_attempts must be at least 1",
        ));
    }
    if session.send_retries == 0 {
        errors.push(ConfigError::validation(
            "session.send_retries must be at least 1",
        ));
    }

    let reconciler = &config.reconciler;
    if reconciler.cleanup_interval_secs == 0 {
        errors.push(ConfigError::validation(
            "reconciler.cleanup_interval_secs must be greater than 0",
        ));
    }
    if reconciler.stale_timeout_secs == 0 {
        errors.push(ConfigError::validation(
            "reconciler.stale_timeout_secs must be greater than 0",
        ));
    }

    if config.ingest.max_content_length == 0 {
        errors.push(ConfigError::validation(
            "ingest.max_content_length must be greater than 0",
        ));
    }

    let bot = &config.bot;
    if bot.send_retries == 0 {
        errors.push(ConfigError::validation("bot.send_retries must be at least 1"));
    }
    for (i, greeting) in bot.greetings.iter().enumerate() {
        if greeting.trim().is_empty() {
            errors.push(ConfigError::validation(format!(
                "bot.greetings[{i}] must not be empty"
            )));
        }
    }
    if bot.fallback_text.trim().is_empty() {
        errors.push(ConfigError::validation("bot.fallback_text must not be empty"));
    }

    let gateway = &config.gateway;
    if gateway.enabled {
        if gateway.host.parse::<std::net::IpAddr>().is_err()
            && !gateway
                .host
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-')
        {
            errors.push(ConfigError::validation(format!(
                "gateway.host `{}` is not a valid IP address or hostname",
                gateway.host
            )));
        }
        if gateway.port == 0 {
            errors.push(ConfigError::validation("gateway.port must not be 0"));
        }
        if let Some(token) = &gateway.bearer_token
            && token.trim().is_empty()
        {
            errors.push(ConfigError::validation(
                "gateway.bearer_token must not be empty when set",
            ));
        }
    }

    if config.transport.backend != "loopback" {
        errors.push(ConfigError::validation(format!(
            "transport.backend `{}` is not supported (available: loopback)",
            config.transport.backend
        )));
    }
    if config.transport.event_buffer == 0 {
        errors.push(ConfigError::validation(
            "transport.event_buffer must be greater than 0",
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(validate_config(&GatehouseConfig::default()).is_ok());
    }

    #[test]
    fn collects_every_error() {
        let mut config = GatehouseConfig::default();
        config.reconciler.cleanup_interval_secs = 0;
        config.ingest.max_content_length = 0;
        config.daemon.log_level = "loud".into();

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 3);
    }

    #[test]
    fn empty_bearer_token_is_rejected() {
        let mut config = GatehouseConfig::default();
        config.gateway.bearer_token = Some("  ".into());
        let errors = validate_config(&config).unwrap_err();
        assert!(errors[0].to_string().contains("bearer_token"));
    }

    #[test]
    fn disabled_gateway_skips_gateway_checks() {
        let mut config = GatehouseConfig::default();
        config.gateway.enabled = false;
        config.gateway.port = 0;
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn unsupported_transport_backend() {
        let mut config = GatehouseConfig::default();
        config.transport.backend = "carrier-pigeon".into();
        assert!(validate_config(&config).is_err());
    }
}
