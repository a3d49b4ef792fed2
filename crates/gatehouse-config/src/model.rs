// SPDX-FileCopyrightText: 2026 Gatehouse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Gatehouse session gateway.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Top-level Gatehouse configuration.
///
/// Loaded from TOML files following XDG hierarchy, with environment variable overrides.
/// All sections are optional and default to sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct GatehouseConfig {
    /// Process-level settings.
    #[serde(default)]
    pub daemon: DaemonConfig,

    /// Storage backend settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Connection lifecycle and retry settings.
    #[serde(default)]
    pub session: SessionConfig,

    /// Background reconciliation settings.
    #[serde(default)]
    pub reconciler: ReconcilerConfig,

    /// Inbound message handling.
    #[serde(default)]
    pub ingest: IngestConfig,

    /// Auto-responder settings.
    #[serde(default)]
    pub bot: BotConfig,

    /// HTTP/WebSocket gateway settings.
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Transport backend selection.
    #[serde(default)]
    pub transport: TransportConfig,
}

/// Process-level configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DaemonConfig {
    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Reconnect tenants that were connected when the process last stopped.
    #[serde(default = "default_true")]
    pub restore_sessions: bool,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            restore_sessions: true,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}

/// Storage backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Enable WAL (Write-Ahead Logging) mode for SQLite.
    #[serde(default = "default_true")]
    pub wal_mode: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            wal_mode: true,
        }
    }
}

fn default_database_path() -> String {
    dirs::data_dir()
        .map(|p| p.join("gatehouse").join("gatehouse.db"))
        .unwrap_or_else(|| std::path::PathBuf::from("gatehouse.db"))
        .to_string_lossy()
        .into_owned()
}

/// Connection lifecycle configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SessionConfig {
    /// Reconnect attempts after a transient disconnect before giving up.
    #[serde(default = "default_max_reconnect_attempts")]
    pub max_reconnect_attempts: u32,

    /// Fixed delay between reconnect attempts.
    #[serde(default = "default_reconnect_delay_ms")]
    pub reconnect_delay_ms: u64,

    /// Soft restarts allowed before falling back to the reconnect path.
    #[serde(default = "default_max_restart_attempts")]
    pub max_restart_attempts: u32,

    /// Delay before rebuilding the client after a restart signal.
    #[serde(default = "default_restart_delay_ms")]
    pub restart_delay_ms: u64,

    /// Polls performed by a QR wait before timing out.
    #[serde(default = "default_qr_wait_attempts")]
    pub qr_wait_attempts: u32,

    /// Delay between QR wait polls.
    #[serde(default = "default_qr_wait_delay_ms")]
    pub qr_wait_delay_ms: u64,

    /// Attempts for an explicit send before reporting failure.
    #[serde(default = "default_send_retries")]
    pub send_retries: u32,

    /// Delay between explicit send attempts.
    #[serde(default = "default_send_retry_delay_ms")]
    pub send_retry_delay_ms: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_reconnect_attempts: default_max_reconnect_attempts(),
            reconnect_delay_ms: default_reconnect_delay_ms(),
            max_restart_attempts: default_max_restart_attempts(),
            restart_delay_ms: default_restart_delay_ms(),
            qr_wait_attempts: default_qr_wait_attempts(),
            qr_wait_delay_ms: default_qr_wait_delay_ms(),
            send_retries: default_send_retries(),
            send_retry_delay_ms: default_send_retry_delay_ms(),
        }
    }
}

impl SessionConfig {
    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }

    pub fn restart_delay(&self) -> Duration {
        Duration::from_millis(self.restart_delay_ms)
    }

    pub fn qr_wait_delay(&self) -> Duration {
        Duration::from_millis(self.qr_wait_delay_ms)
    }

    pub fn send_retry_delay(&self) -> Duration {
        Duration::from_millis(self.send_retry_delay_ms)
    }
}

fn default_max_reconnect_attempts() -> u32 {
    5
}

fn default_reconnect_delay_ms() -> u64 {
    5_000
}

fn default_max_restart_attempts() -> u32 {
    3
}

fn default_restart_delay_ms() -> u64 {
    2_000
}

fn default_qr_wait_attempts() -> u32 {
    10
}

fn default_qr_wait_delay_ms() -> u64 {
    1_000
}

fn default_send_retries() -> u32 {
    3
}

fn default_send_retry_delay_ms() -> u64 {
    1_000
}

/// Session reconciliation configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ReconcilerConfig {
    /// Run the periodic reconciliation task.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Interval between reconciliation cycles.
    #[serde(default = "default_cleanup_interval_secs")]
    pub cleanup_interval_secs: u64,

    /// Live sessions without activity for longer than this are zombies.
    #[serde(default = "default_stale_timeout_secs")]
    pub stale_timeout_secs: u64,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            cleanup_interval_secs: default_cleanup_interval_secs(),
            stale_timeout_secs: default_stale_timeout_secs(),
        }
    }
}

impl ReconcilerConfig {
    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval_secs)
    }

    pub fn stale_timeout(&self) -> Duration {
        Duration::from_secs(self.stale_timeout_secs)
    }
}

fn default_cleanup_interval_secs() -> u64 {
    300
}

fn default_stale_timeout_secs() -> u64 {
    86_400
}

/// Inbound message handling configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct IngestConfig {
    /// Stored content is truncated to this many characters.
    #[serde(default = "default_max_content_length")]
    pub max_content_length: usize,

    /// Forward inbound messages to the auto-responder.
    #[serde(default = "default_true")]
    pub bot_enabled: bool,

    /// Auto-respond in group chats too.
    #[serde(default)]
    pub reply_in_groups: bool,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            max_content_length: default_max_content_length(),
            bot_enabled: true,
            reply_in_groups: false,
        }
    }
}

fn default_max_content_length() -> usize {
    4_096
}

/// Auto-responder configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct BotConfig {
    /// Literal greetings answered with `greeting_text`.
    #[serde(default = "default_greetings")]
    pub greetings: Vec<String>,

    #[serde(default = "default_greeting_text")]
    pub greeting_text: String,

    /// Reply when nothing else matched.
    #[serde(default = "default_fallback_text")]
    pub fallback_text: String,

    /// Currency label used when rendering prices.
    #[serde(default = "default_currency")]
    pub currency: String,

    /// Reply send attempts before the reply is reported as failed.
    #[serde(default = "default_send_retries")]
    pub send_retries: u32,

    #[serde(default = "default_send_retry_delay_ms")]
    pub send_retry_delay_ms: u64,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            greetings: default_greetings(),
            greeting_text: default_greeting_text(),
            fallback_text: default_fallback_text(),
            currency: default_currency(),
            send_retries: default_send_retries(),
            send_retry_delay_ms: default_send_retry_delay_ms(),
        }
    }
}

impl BotConfig {
    pub fn send_retry_delay(&self) -> Duration {
        Duration::from_millis(self.send_retry_delay_ms)
    }
}

fn default_greetings() -> Vec<String> {
    vec!["hi".to_string(), "hello".to_string(), "halo".to_string()]
}

fn default_greeting_text() -> String {
    "Hello! Type 'catalog' to see our products, 'order <product>:<qty>' to order, \
     or 'status' to check your orders."
        .to_string()
}

fn default_fallback_text() -> String {
    "Sorry, I didn't understand that. Type 'catalog', 'order <product>:<qty>', or 'status'."
        .to_string()
}

fn default_currency() -> String {
    "IDR".to_string()
}

/// HTTP/WebSocket gateway configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct GatewayConfig {
    /// Serve the HTTP API.
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Bearer token required on API routes. Without one, API routes reject
    /// every request.
    #[serde(default)]
    pub bearer_token: Option<String>,

    /// Expose the Prometheus scrape endpoint.
    #[serde(default = "default_true")]
    pub metrics_enabled: bool,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            host: default_host(),
            port: default_port(),
            bearer_token: None,
            metrics_enabled: true,
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3100
}

/// Transport backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct TransportConfig {
    /// Backend name. Only `loopback` ships with this binary.
    #[serde(default = "default_transport_backend")]
    pub backend: String,

    /// Loopback: delay between emitting the QR and opening the session.
    #[serde(default = "default_pairing_delay_ms")]
    pub pairing_delay_ms: u64,

    /// Capacity of each tenant's transport event channel.
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            backend: default_transport_backend(),
            pairing_delay_ms: default_pairing_delay_ms(),
            event_buffer: default_event_buffer(),
        }
    }
}

fn default_transport_backend() -> String {
    "loopback".to_string()
}

fn default_pairing_delay_ms() -> u64 {
    3_000
}

fn default_event_buffer() -> usize {
    256
}
