// SPDX-FileCopyrightText: 2026 Gatehouse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Gatehouse session gateway.
//!
//! Disconnect classification (transient, restart, terminal) is not an error
//! and lives in [`crate::types::DisconnectKind`]. Duplicate message delivery
//! is absorbed by the ingest pipeline and never surfaces here.

use std::time::Duration;

use thiserror::Error;

/// The primary error type used across all Gatehouse crates.
#[derive(Debug, Error)]
pub enum GatehouseError {
    /// Configuration errors (invalid TOML, missing required fields, type mismatches).
    #[error("configuration error: {0}")]
    Config(String),

    /// Storage backend errors (database connection, query failure, serialization).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// The transport client for a tenant could not be constructed.
    ///
    /// Fatal for that connect attempt; surfaced to the caller and never retried
    /// automatically.
    #[error("failed to initialize connection for tenant {tenant}: {message}")]
    ConnectionInit {
        tenant: String,
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A transport-level operation failed (send, logout).
    #[error("transport error: {message}")]
    Transport {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Outbound send failed after exhausting its bounded retries.
    #[error("send to {chat_id} for tenant {tenant} failed after {attempts} attempts: {message}")]
    SendFailure {
        tenant: String,
        chat_id: String,
        attempts: u32,
        message: String,
    },

    /// The tenant has no live, open session.
    #[error("tenant {tenant} is not connected")]
    NotConnected { tenant: String },

    /// The tenant's session is already open, so there is no QR to hand out.
    #[error("tenant {tenant} is already connected")]
    AlreadyConnected { tenant: String },

    /// Operation timed out.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: Duration },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl GatehouseError {
    /// Shorthand for a transport error without an underlying source.
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            source: None,
        }
    }

    /// Returns `true` for errors a caller may reasonably retry.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport { .. } | Self::Timeout { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn send_failure_message_names_chat_and_attempts() {
        let err = GatehouseError::SendFailure {
            tenant: "t-1".into(),
            chat_id: "628123@s.whatsapp.net".into(),
            attempts: 3,
            message: "socket closed".into(),
        };
        let text = err.to_string();
        assert!(text.contains("628123@s.whatsapp.net"));
        assert!(text.contains("3 attempts"));
    }

    #[test]
    fn only_transport_and_timeout_are_retryable() {
        assert!(GatehouseError::transport("boom").is_retryable());
        assert!(
            GatehouseError::Timeout {
                duration: Duration::from_secs(1)
            }
            .is_retryable()
        );
        assert!(!GatehouseError::NotConnected { tenant: "t".into() }.is_retryable());
        assert!(!GatehouseError::AlreadyConnected { tenant: "t".into() }.is_retryable());
        assert!(!GatehouseError::Config("bad".into()).is_retryable());
    }
}
