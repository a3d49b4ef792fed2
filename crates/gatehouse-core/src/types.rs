// SPDX-FileCopyrightText: 2026 Gatehouse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Common types shared across the adapter traits and the Gatehouse crates.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Identifier of a tenant account owning one messaging connection.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TenantId(pub String);

impl TenantId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Value of `auth_data_ref` in the session record while credentials exist.
    pub fn auth_data_ref(&self) -> String {
        format!("auth_state:{}", self.0)
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TenantId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for TenantId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Health status reported by adapter health checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// Adapter is fully operational.
    Healthy,
    /// Adapter is operational but experiencing issues.
    Degraded(String),
    /// Adapter is not operational.
    Unhealthy(String),
}

/// Identifies the type of adapter behind a [`PluginAdapter`](crate::PluginAdapter).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
pub enum AdapterType {
    Storage,
    Transport,
    Observability,
}

// --- Connection lifecycle ---

/// Connection state of a tenant session.
///
/// `Idle` is reported on the wire as `"close"`, matching what status consumers
/// have always seen for a tenant without a live connection.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    #[default]
    #[strum(to_string = "close", serialize = "idle")]
    #[serde(rename = "close", alias = "idle")]
    Idle,
    Connecting,
    AwaitingQr,
    Authenticating,
    Open,
    Closing,
    Restarting,
    Error,
}

impl ConnectionState {
    /// States in which a connect attempt is already under way.
    pub fn is_in_flight(self) -> bool {
        matches!(
            self,
            Self::Connecting | Self::AwaitingQr | Self::Authenticating | Self::Restarting
        )
    }

    pub fn is_open(self) -> bool {
        self == Self::Open
    }
}

/// How a transport disconnect must be handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum DisconnectKind {
    /// Transient drop; reconnect with bounded retries.
    Reconnectable,
    /// Expected post-pairing signal; rebuild the client, keep credentials.
    RestartRequired,
    /// Credentials are gone; clear everything and never retry.
    Terminal,
}

/// Reason attached to a transport `Closed` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisconnectReason {
    pub code: u16,
    #[serde(default)]
    pub message: Option<String>,
}

impl DisconnectReason {
    pub const LOGGED_OUT: u16 = 401;
    pub const FORBIDDEN: u16 = 403;
    pub const CONNECTION_LOST: u16 = 408;
    pub const CONNECTION_CLOSED: u16 = 428;
    pub const CONNECTION_REPLACED: u16 = 440;
    pub const BAD_SESSION: u16 = 500;
    pub const SERVICE_UNAVAILABLE: u16 = 503;
    pub const RESTART_REQUIRED: u16 = 515;

    pub fn new(code: u16) -> Self {
        Self {
            code,
            message: None,
        }
    }

    pub fn with_message(code: u16, message: impl Into<String>) -> Self {
        Self {
            code,
            message: Some(message.into()),
        }
    }

    pub fn connection_lost() -> Self {
        Self::with_message(Self::CONNECTION_LOST, "event stream ended")
    }

    /// Classifies this reason into reconnectable, restart, or terminal.
    pub fn kind(&self) -> DisconnectKind {
        match self.code {
            Self::LOGGED_OUT | Self::FORBIDDEN | Self::BAD_SESSION => DisconnectKind::Terminal,
            Self::RESTART_REQUIRED => DisconnectKind::RestartRequired,
            _ => DisconnectKind::Reconnectable,
        }
    }
}

impl fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.message {
            Some(m) => write!(f, "{} ({m})", self.code),
            None => write!(f, "{}", self.code),
        }
    }
}

/// Opaque transport credentials for one tenant.
#[derive(Clone, PartialEq, Eq)]
pub struct AuthCredentials(pub Vec<u8>);

impl fmt::Debug for AuthCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AuthCredentials([redacted; {} bytes])", self.0.len())
    }
}

/// An inbound message as delivered by the transport, before validation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawInboundEvent {
    /// Stable external message identifier.
    #[serde(default)]
    pub message_id: Option<String>,
    /// External chat address (e.g. `628123@s.whatsapp.net`, `1203@g.us`).
    #[serde(default)]
    pub chat_id: Option<String>,
    /// Text body; `None` for media or protocol payloads.
    #[serde(default)]
    pub text: Option<String>,
    /// Whether the tenant's own account sent this message.
    #[serde(default)]
    pub from_me: bool,
    /// Unix timestamp in seconds reported by the transport.
    #[serde(default)]
    pub timestamp: Option<i64>,
}

/// Returns `true` for group chat addresses.
pub fn is_group_chat(chat_id: &str) -> bool {
    chat_id.ends_with("@g.us")
}

/// Normalizes an external chat address to the contact address key
/// (the part before `@`, with a leading `+` removed).
pub fn normalize_address(chat_id: &str) -> String {
    let local = chat_id.split('@').next().unwrap_or(chat_id);
    let local = local.split(':').next().unwrap_or(local);
    local.trim().trim_start_matches('+').to_string()
}

/// Events emitted by a tenant's transport client, delivered in order.
#[derive(Debug, Clone)]
pub enum TransportEvent {
    /// A pairing QR payload to be shown to the user.
    Qr(String),
    /// The connection is authenticated and open.
    Opened,
    /// The connection closed.
    Closed(DisconnectReason),
    /// Soft restart: re-authenticate without logging out.
    RestartRequired,
    /// A live inbound (or own-echo) message.
    Message(RawInboundEvent),
    /// A batch of historical messages synced after pairing.
    History(Vec<RawInboundEvent>),
    /// The transport rotated its credentials; they must be persisted.
    CredentialsUpdated(AuthCredentials),
}

/// Point-in-time status of a tenant session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionStatus {
    pub tenant_id: String,
    pub connected: bool,
    pub state: ConnectionState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub qr: Option<String>,
    #[serde(default)]
    pub reconnect_attempts: u32,
    #[serde(default)]
    pub restart_attempts: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_connected_at: Option<String>,
    /// Human-readable detail for terminal or fatal states.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl SessionStatus {
    /// Status of a tenant with no live session and no persisted record.
    pub fn idle(tenant: &TenantId) -> Self {
        Self {
            tenant_id: tenant.to_string(),
            connected: false,
            state: ConnectionState::Idle,
            qr: None,
            reconnect_attempts: 0,
            restart_attempts: 0,
            last_connected_at: None,
            detail: None,
        }
    }

    /// Status reconstructed from a persisted record.
    pub fn from_record(record: &SessionRecord) -> Self {
        Self {
            tenant_id: record.tenant_id.clone(),
            connected: record.is_connected,
            state: record
                .connection_state
                .parse()
                .unwrap_or(ConnectionState::Idle),
            qr: record.qr_code.clone(),
            reconnect_attempts: 0,
            restart_attempts: 0,
            last_connected_at: record.last_connected_at.clone(),
            detail: None,
        }
    }
}

/// Events published to the realtime sink, scoped to one tenant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RealtimeEvent {
    Status(SessionStatus),
    Qr {
        qr: String,
    },
    NewMessage {
        message_id: String,
        chat_id: String,
        content: String,
        is_outgoing: bool,
        sender_id: Option<i64>,
        created_at: String,
    },
    HistorySynced {
        stored: usize,
    },
}

impl RealtimeEvent {
    /// Wire name of the event, as used for the `type` tag.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Status(_) => "status",
            Self::Qr { .. } => "qr",
            Self::NewMessage { .. } => "new_message",
            Self::HistorySynced { .. } => "history_synced",
        }
    }
}

// --- Persisted entities ---

/// Durable per-tenant session record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub tenant_id: String,
    pub is_connected: bool,
    pub connection_state: String,
    pub last_connected_at: Option<String>,
    pub qr_code: Option<String>,
    pub auth_data_ref: Option<String>,
    pub updated_at: String,
}

/// A known contact of a tenant, used to resolve message senders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
    pub id: i64,
    pub tenant_id: String,
    pub name: String,
    pub address: String,
}

/// A chat of a tenant, created lazily on first message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: i64,
    pub chat_id: String,
    pub tenant_id: String,
    pub is_group: bool,
    pub created_at: String,
}

/// A stored message. `message_id` is the external identifier and is unique.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub message_id: String,
    pub conversation_id: i64,
    pub sender_id: Option<i64>,
    pub content: String,
    pub is_outgoing: bool,
    pub status: String,
    pub created_at: String,
}

/// Keyword auto-response rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BotRule {
    pub id: i64,
    pub tenant_id: String,
    pub trigger_keyword: String,
    pub response_text: String,
    pub priority: i64,
    pub active: bool,
}

/// A catalog product the bot can list and order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: i64,
    pub tenant_id: String,
    pub name: String,
    /// Unit price in minor currency units.
    pub price: i64,
    pub stock: i64,
    pub active: bool,
}

/// One requested line of an order command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderItemRequest {
    pub product_id: i64,
    pub quantity: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    pub product_id: i64,
    pub product_name: String,
    pub quantity: i64,
    pub unit_price: i64,
    pub line_total: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: i64,
    pub tenant_id: String,
    pub contact_id: i64,
    pub status: String,
    pub total: i64,
    pub created_at: String,
    pub lines: Vec<OrderLine>,
}

/// A requested quantity that could not be reserved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Shortfall {
    pub product_id: i64,
    pub product_name: String,
    pub requested: i64,
    pub reserved: i64,
}

/// Result of placing an order: the order (if any line was reservable) and
/// every shortfall recorded as pending demand.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderPlacement {
    pub order: Option<Order>,
    pub shortfalls: Vec<Shortfall>,
}

/// Demand for unavailable inventory, recorded as a side effect of ordering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingDemand {
    pub id: i64,
    pub tenant_id: String,
    pub product_id: i64,
    pub quantity: i64,
    pub requester_id: i64,
    pub created_at: String,
}

/// Storage format for every persisted timestamp.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3fZ";

/// Current UTC time formatted the way every persisted timestamp is stored.
pub fn now_timestamp() -> String {
    format_timestamp(Utc::now())
}

pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.format(TIMESTAMP_FORMAT).to_string()
}

/// Parses a stored timestamp; accepts any RFC 3339 string.
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}
