// SPDX-FileCopyrightText: 2026 Gatehouse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-process transport for local runs.
//!
//! A new pairing emits one QR payload, then "scans" itself after the
//! configured pairing delay: it hands out credentials and opens. Resumed
//! sessions open immediately. Every send succeeds with a generated id and
//! is echoed back as an own message, the way real transports report
//! messages sent from the paired device.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use gatehouse_config::model::TransportConfig;
use gatehouse_core::{
    AdapterType, AuthCredentials, DisconnectReason, GatehouseError, HealthStatus, PluginAdapter,
    RawInboundEvent, TenantId, TransportClient, TransportConnection, TransportEvent,
    TransportFactory,
};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

pub struct LoopbackTransportFactory {
    pairing_delay: Duration,
    event_buffer: usize,
}

impl LoopbackTransportFactory {
    pub fn new(config: &TransportConfig) -> Self {
        Self {
            pairing_delay: Duration::from_millis(config.pairing_delay_ms),
            event_buffer: config.event_buffer.max(1),
        }
    }
}

#[async_trait]
impl PluginAdapter for LoopbackTransportFactory {
    fn name(&self) -> &str {
        "loopback"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Transport
    }

    async fn health_check(&self) -> Result<HealthStatus, GatehouseError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), GatehouseError> {
        Ok(())
    }
}

#[async_trait]
impl TransportFactory for LoopbackTransportFactory {
    async fn create(
        &self,
        tenant: &TenantId,
        credentials: Option<AuthCredentials>,
    ) -> Result<TransportConnection, GatehouseError> {
        let (tx, rx) = mpsc::channel(self.event_buffer);
        let client = Arc::new(LoopbackClient {
            tenant: tenant.clone(),
            events: Mutex::new(Some(tx.clone())),
            stopped: CancellationToken::new(),
            logged_out: AtomicBool::new(false),
        });

        let stopped = client.stopped.clone();
        let delay = self.pairing_delay;
        let resumed = credentials.is_some();
        let tenant = tenant.clone();
        tokio::spawn(async move {
            if !resumed {
                let qr = format!("gatehouse-loopback:{tenant}:{}", uuid::Uuid::new_v4());
                if tx.send(TransportEvent::Qr(qr)).await.is_err() {
                    return;
                }
                tokio::select! {
                    _ = stopped.cancelled() => return,
                    _ = tokio::time::sleep(delay) => {}
                }
                let creds = AuthCredentials(format!("loopback:{tenant}").into_bytes());
                if tx.send(TransportEvent::CredentialsUpdated(creds)).await.is_err() {
                    return;
                }
            }
            if !stopped.is_cancelled() {
                let _ = tx.send(TransportEvent::Opened).await;
            }
            debug!(tenant = %tenant, resumed, "loopback pairing finished");
        });

        Ok(TransportConnection { client, events: rx })
    }
}

struct LoopbackClient {
    tenant: TenantId,
    events: Mutex<Option<mpsc::Sender<TransportEvent>>>,
    stopped: CancellationToken,
    logged_out: AtomicBool,
}

impl LoopbackClient {
    fn sender(&self) -> Option<mpsc::Sender<TransportEvent>> {
        self.events.lock().ok().and_then(|guard| guard.clone())
    }

    fn stop(&self) -> Option<mpsc::Sender<TransportEvent>> {
        self.stopped.cancel();
        self.events.lock().ok().and_then(|mut guard| guard.take())
    }
}

#[async_trait]
impl TransportClient for LoopbackClient {
    async fn send(&self, chat_id: &str, text: &str) -> Result<String, GatehouseError> {
        let Some(tx) = self.sender() else {
            return Err(GatehouseError::transport(format!(
                "loopback client for {} is closed",
                self.tenant
            )));
        };
        let message_id = format!("LB{}", uuid::Uuid::new_v4().simple()).to_uppercase();
        let echo = RawInboundEvent {
            message_id: Some(message_id.clone()),
            chat_id: Some(chat_id.to_string()),
            text: Some(text.to_string()),
            from_me: true,
            timestamp: Some(chrono::Utc::now().timestamp()),
        };
        // The echo is best effort; a full buffer must not fail the send.
        let _ = tx.try_send(TransportEvent::Message(echo));
        Ok(message_id)
    }

    async fn logout(&self) -> Result<(), GatehouseError> {
        if self.logged_out.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        if let Some(tx) = self.stop() {
            let _ = tx.try_send(TransportEvent::Closed(DisconnectReason::new(
                DisconnectReason::LOGGED_OUT,
            )));
        }
        Ok(())
    }

    async fn close(&self) -> Result<(), GatehouseError> {
        self.stop();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn factory(pairing_delay_ms: u64) -> LoopbackTransportFactory {
        LoopbackTransportFactory::new(&TransportConfig {
            pairing_delay_ms,
            ..TransportConfig::default()
        })
    }

    #[tokio::test]
    async fn fresh_pairing_emits_qr_then_credentials_then_open() {
        let conn = factory(5)
            .create(&TenantId::new("acme"), None)
            .await
            .unwrap();
        let mut events = conn.events;

        match events.recv().await.unwrap() {
            TransportEvent::Qr(qr) => assert!(qr.starts_with("gatehouse-loopback:acme:")),
            other => panic!("expected qr, got {other:?}"),
        }
        assert!(matches!(
            events.recv().await.unwrap(),
            TransportEvent::CredentialsUpdated(_)
        ));
        assert!(matches!(events.recv().await.unwrap(), TransportEvent::Opened));
    }

    #[tokio::test]
    async fn resumed_session_opens_without_qr() {
        let conn = factory(10_000)
            .create(&TenantId::new("acme"), Some(AuthCredentials(b"c".to_vec())))
            .await
            .unwrap();
        let mut events = conn.events;
        assert!(matches!(events.recv().await.unwrap(), TransportEvent::Opened));
    }

    #[tokio::test]
    async fn send_echoes_own_message_with_same_id() {
        let conn = factory(10_000)
            .create(&TenantId::new("acme"), Some(AuthCredentials(b"c".to_vec())))
            .await
            .unwrap();
        let mut events = conn.events;
        assert!(matches!(events.recv().await.unwrap(), TransportEvent::Opened));

        let id = conn.client.send("628123@s.whatsapp.net", "hello").await.unwrap();
        match events.recv().await.unwrap() {
            TransportEvent::Message(raw) => {
                assert_eq!(raw.message_id.as_deref(), Some(id.as_str()));
                assert!(raw.from_me);
                assert_eq!(raw.text.as_deref(), Some("hello"));
            }
            other => panic!("expected echo, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn logout_reports_logged_out_and_ends_stream() {
        let conn = factory(10_000)
            .create(&TenantId::new("acme"), Some(AuthCredentials(b"c".to_vec())))
            .await
            .unwrap();
        let mut events = conn.events;
        assert!(matches!(events.recv().await.unwrap(), TransportEvent::Opened));

        conn.client.logout().await.unwrap();
        match events.recv().await.unwrap() {
            TransportEvent::Closed(reason) => assert_eq!(reason.code, DisconnectReason::LOGGED_OUT),
            other => panic!("expected close, got {other:?}"),
        }
        assert!(events.recv().await.is_none());
        assert!(conn.client.send("x", "y").await.is_err());
    }

    #[tokio::test]
    async fn close_during_pairing_stops_before_open() {
        let conn = factory(10_000)
            .create(&TenantId::new("acme"), None)
            .await
            .unwrap();
        let mut events = conn.events;
        assert!(matches!(events.recv().await.unwrap(), TransportEvent::Qr(_)));
        conn.client.close().await.unwrap();
        assert!(events.recv().await.is_none());
    }
}
