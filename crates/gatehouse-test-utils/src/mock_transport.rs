// SPDX-FileCopyrightText: 2026 Gatehouse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Scriptable transport for deterministic lifecycle tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::mpsc;

use gatehouse_core::{
    AdapterType, AuthCredentials, DisconnectReason, GatehouseError, HealthStatus, PluginAdapter,
    TenantId, TransportClient, TransportConnection, TransportEvent, TransportFactory,
};

/// One transport instance handed out by [`MockTransportFactory`].
pub struct MockTransport {
    tenant: TenantId,
    credentials: Option<AuthCredentials>,
    events: Mutex<Option<mpsc::Sender<TransportEvent>>>,
    sent: Mutex<Vec<(String, String)>>,
    failing_sends: AtomicU32,
    logged_out: AtomicBool,
    closed: AtomicBool,
    seq: AtomicU64,
}

impl MockTransport {
    pub fn tenant(&self) -> &TenantId {
        &self.tenant
    }

    /// Whether the instance was built from stored credentials.
    pub fn resumed(&self) -> bool {
        self.credentials.is_some()
    }

    /// Push an event to the controller. Ignored once the stream ended.
    pub async fn emit(&self, event: TransportEvent) {
        let sender = self.events.lock().unwrap().clone();
        if let Some(sender) = sender {
            let _ = sender.send(event).await;
        }
    }

    /// End the event stream without a close notification.
    pub fn end_stream(&self) {
        self.events.lock().unwrap().take();
    }

    /// Make the next `n` sends fail with a transport error.
    pub fn fail_next_sends(&self, n: u32) {
        self.failing_sends.store(n, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }

    pub fn logged_out(&self) -> bool {
        self.logged_out.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TransportClient for MockTransport {
    async fn send(&self, chat_id: &str, text: &str) -> Result<String, GatehouseError> {
        let failing = self
            .failing_sends
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        if failing.is_ok() {
            return Err(GatehouseError::transport("mock send failure"));
        }
        self.sent
            .lock()
            .unwrap()
            .push((chat_id.to_string(), text.to_string()));
        let n = self.seq.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(format!("mock-{}-{n}", self.tenant))
    }

    async fn logout(&self) -> Result<(), GatehouseError> {
        self.logged_out.store(true, Ordering::SeqCst);
        let sender = self.events.lock().unwrap().clone();
        if let Some(sender) = sender {
            let _ = sender.try_send(TransportEvent::Closed(DisconnectReason::new(
                DisconnectReason::LOGGED_OUT,
            )));
        }
        Ok(())
    }

    async fn close(&self) -> Result<(), GatehouseError> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

#[derive(Default)]
struct FactoryState {
    created: HashMap<TenantId, Vec<Arc<MockTransport>>>,
    on_create: Vec<TransportEvent>,
    failures: u32,
}

/// Factory recording every transport it builds.
#[derive(Default)]
pub struct MockTransportFactory {
    state: Mutex<FactoryState>,
}

impl MockTransportFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Events queued on every new transport before it is returned.
    pub fn emit_on_create(&self, events: Vec<TransportEvent>) {
        self.state.lock().unwrap().on_create = events;
    }

    /// Make the next `n` creations fail.
    pub fn fail_next_creates(&self, n: u32) {
        self.state.lock().unwrap().failures = n;
    }

    pub fn latest(&self, tenant: &TenantId) -> Option<Arc<MockTransport>> {
        self.state
            .lock()
            .unwrap()
            .created
            .get(tenant)
            .and_then(|all| all.last().cloned())
    }

    pub fn created_count(&self, tenant: &TenantId) -> usize {
        self.state
            .lock()
            .unwrap()
            .created
            .get(tenant)
            .map_or(0, Vec::len)
    }
}

#[async_trait]
impl PluginAdapter for MockTransportFactory {
    fn name(&self) -> &str {
        "mock-transport"
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
impl TransportFactory for MockTransportFactory {
    async fn create(
        &self,
        tenant: &TenantId,
        credentials: Option<AuthCredentials>,
    ) -> Result<TransportConnection, GatehouseError> {
        let mut state = self.state.lock().unwrap();
        if state.failures > 0 {
            state.failures -= 1;
            return Err(GatehouseError::transport("mock factory failure"));
        }

        let (tx, rx) = mpsc::channel(64);
        for event in &state.on_create {
            let _ = tx.try_send(event.clone());
        }
        let transport = Arc::new(MockTransport {
            tenant: tenant.clone(),
            credentials,
            events: Mutex::new(Some(tx)),
            sent: Mutex::new(Vec::new()),
            failing_sends: AtomicU32::new(0),
            logged_out: AtomicBool::new(false),
            closed: AtomicBool::new(false),
            seq: AtomicU64::new(0),
        });
        state
            .created
            .entry(tenant.clone())
            .or_default()
            .push(transport.clone());

        Ok(TransportConnection {
            client: transport,
            events: rx,
        })
    }
}
