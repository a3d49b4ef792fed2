// SPDX-FileCopyrightText: 2026 Gatehouse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-tenant session lifecycle.
//!
//! The controller owns every transition of a tenant's session. Transport
//! events are drained by one driver task per transport instance; each
//! lifecycle event is run through [`fsm::step`] and the resulting effects are
//! executed here, in order.

use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use gatehouse_config::model::SessionConfig;
use gatehouse_core::types::now_timestamp;
use gatehouse_core::{
    AuthStateStore, GatehouseError, OutboundSender, RealtimeEvent, RealtimeSink, SessionStatus,
    StorageAdapter, TenantId, TransportClient, TransportEvent, TransportFactory, with_retries,
};
use gatehouse_ingest::{IngestOutcome, MessageIngestPipeline};
use tokio::sync::{OwnedMutexGuard, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::fsm::{self, Effect, LifecycleEvent, RetryPolicy, Session, Transition};
use crate::registry::{ConnectionRegistry, SessionHandle};

pub struct SessionLifecycleController {
    registry: Arc<ConnectionRegistry>,
    storage: Arc<dyn StorageAdapter>,
    auth: Arc<dyn AuthStateStore>,
    transport: Arc<dyn TransportFactory>,
    sink: Arc<dyn RealtimeSink>,
    ingest: Arc<MessageIngestPipeline>,
    config: SessionConfig,
    policy: RetryPolicy,
    shutdown: CancellationToken,
}

impl SessionLifecycleController {
    pub fn new(
        registry: Arc<ConnectionRegistry>,
        storage: Arc<dyn StorageAdapter>,
        auth: Arc<dyn AuthStateStore>,
        transport: Arc<dyn TransportFactory>,
        sink: Arc<dyn RealtimeSink>,
        ingest: Arc<MessageIngestPipeline>,
        config: SessionConfig,
    ) -> Arc<Self> {
        Arc::new(Self {
            policy: RetryPolicy::from(&config),
            registry,
            storage,
            auth,
            transport,
            sink,
            ingest,
            config,
            shutdown: CancellationToken::new(),
        })
    }

    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    pub fn ingest(&self) -> &Arc<MessageIngestPipeline> {
        &self.ingest
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Lock the registered handle of `tenant`, creating it if needed.
    async fn lock_current(&self, tenant: &TenantId) -> (Arc<SessionHandle>, OwnedMutexGuard<()>) {
        loop {
            let handle = self.registry.get_or_insert(tenant);
            let guard = handle.lock_ops().await;
            if self.registry.is_current(&handle) {
                gatehouse_prometheus::set_live_sessions(self.registry.len());
                return (handle, guard);
            }
        }
    }

    /// Start a connection for `tenant`.
    ///
    /// A no-op returning the current status while a connect is already in
    /// flight or the session is open.
    pub async fn connect(self: &Arc<Self>, tenant: &TenantId) -> Result<SessionStatus, GatehouseError> {
        let (handle, _guard) = self.lock_current(tenant).await;
        let state = handle.session().state;
        if state.is_in_flight() || state.is_open() {
            debug!(tenant = %tenant, %state, "connect ignored, session already active");
            return Ok(handle.status());
        }
        handle.cancel_timer();
        self.start_transport(&handle, true).await
    }

    /// Build a transport for `handle` and spawn its driver. Caller holds the op lock.
    async fn start_transport(
        self: &Arc<Self>,
        handle: &Arc<SessionHandle>,
        reset_attempts: bool,
    ) -> Result<SessionStatus, GatehouseError> {
        let tenant = handle.tenant().clone();
        if let Some(stale) = handle.detach() {
            close_quietly(&tenant, stale).await;
        }

        let credentials = match self.auth.load(&tenant).await {
            Ok(credentials) => credentials,
            Err(e) => {
                self.apply(handle, LifecycleEvent::ConnectFailed(e.to_string()))
                    .await;
                return Err(e);
            }
        };
        self.apply(
            handle,
            LifecycleEvent::Connect {
                resumed: credentials.is_some(),
                reset_attempts,
            },
        )
        .await;

        match self.transport.create(&tenant, credentials).await {
            Ok(connection) => {
                let driver = self.shutdown.child_token();
                let generation = handle.attach(connection.client, driver.clone());
                tokio::spawn(driver_task(
                    self.clone(),
                    handle.clone(),
                    generation,
                    connection.events,
                    driver,
                ));
                gatehouse_prometheus::record_connect("started");
                info!(tenant = %tenant, generation, "transport started");
                Ok(handle.status())
            }
            Err(e) => {
                let message = e.to_string();
                warn!(tenant = %tenant, error = %message, "transport creation failed");
                self.apply(handle, LifecycleEvent::ConnectFailed(message.clone()))
                    .await;
                gatehouse_prometheus::record_connect("failed");
                Err(GatehouseError::ConnectionInit {
                    tenant: tenant.to_string(),
                    message,
                    source: Some(Box::new(e)),
                })
            }
        }
    }

    async fn on_transport_event(
        self: &Arc<Self>,
        handle: &Arc<SessionHandle>,
        generation: u64,
        event: TransportEvent,
    ) {
        let tenant = handle.tenant();
        match event {
            TransportEvent::Qr(payload) => {
                debug!(tenant = %tenant, "qr received");
                self.on_lifecycle_event(handle, generation, LifecycleEvent::Qr(payload))
                    .await;
            }
            TransportEvent::Opened => {
                gatehouse_prometheus::record_connect("opened");
                info!(tenant = %tenant, "session open");
                let at = now_timestamp();
                self.on_lifecycle_event(handle, generation, LifecycleEvent::Opened { at })
                    .await;
            }
            TransportEvent::Closed(reason) => {
                let kind = reason.kind();
                gatehouse_prometheus::record_disconnect(&kind.to_string());
                info!(tenant = %tenant, code = reason.code, %kind, "transport closed");
                self.on_lifecycle_event(handle, generation, LifecycleEvent::Closed(reason))
                    .await;
            }
            TransportEvent::RestartRequired => {
                info!(tenant = %tenant, "transport requested restart");
                self.on_lifecycle_event(handle, generation, LifecycleEvent::RestartRequired)
                    .await;
            }
            TransportEvent::CredentialsUpdated(credentials) => {
                // Held across the save so a disconnect clears after it, never before.
                let _guard = handle.lock_ops().await;
                if handle.generation() != generation || !self.registry.is_current(handle) {
                    debug!(tenant = %tenant, "credentials from superseded transport dropped");
                    return;
                }
                match self.auth.save(tenant, &credentials).await {
                    Ok(()) => self.apply(handle, LifecycleEvent::CredentialsSaved).await,
                    Err(e) => warn!(tenant = %tenant, error = %e, "failed to save credentials"),
                }
            }
            TransportEvent::Message(raw) => {
                if handle.generation() != generation {
                    return;
                }
                self.apply(
                    handle,
                    LifecycleEvent::Activity {
                        at: now_timestamp(),
                    },
                )
                .await;
                match self.ingest.ingest(tenant, &raw).await {
                    Ok(IngestOutcome::Stored(message)) => {
                        debug!(tenant = %tenant, message_id = %message.message_id, "message stored")
                    }
                    Ok(_) => {}
                    Err(e) => warn!(tenant = %tenant, error = %e, "message ingest failed"),
                }
            }
            TransportEvent::History(batch) => {
                if handle.generation() != generation {
                    return;
                }
                if let Err(e) = self.ingest.ingest_history(tenant, &batch).await {
                    warn!(tenant = %tenant, error = %e, "history ingest failed");
                }
            }
        }
    }

    /// Apply an event from transport `generation`, unless it was superseded.
    async fn on_lifecycle_event(
        self: &Arc<Self>,
        handle: &Arc<SessionHandle>,
        generation: u64,
        event: LifecycleEvent,
    ) {
        let _guard = handle.lock_ops().await;
        if handle.generation() != generation || !self.registry.is_current(handle) {
            debug!(tenant = %handle.tenant(), ?event, "event from superseded transport ignored");
            return;
        }
        self.apply(handle, event).await;
    }

    async fn apply(self: &Arc<Self>, handle: &Arc<SessionHandle>, event: LifecycleEvent) {
        let Transition { session, effects } =
            handle.transition(|current| fsm::step(current, event, &self.policy));
        for effect in effects {
            self.run_effect(handle, &session, effect).await;
        }
    }

    async fn run_effect(self: &Arc<Self>, handle: &Arc<SessionHandle>, session: &Session, effect: Effect) {
        let tenant = handle.tenant();
        match effect {
            Effect::CloseClient => {
                if let Some(client) = handle.detach() {
                    close_quietly(tenant, client).await;
                }
            }
            Effect::ClearCredentials => {
                if let Err(e) = self.auth.clear(tenant).await {
                    warn!(tenant = %tenant, error = %e, "failed to clear credentials");
                }
            }
            Effect::Persist => {
                if let Err(e) = self.storage.upsert_session_record(&session.to_record()).await {
                    warn!(tenant = %tenant, error = %e, "failed to persist session record");
                }
            }
            Effect::DeleteRecord => {
                if let Err(e) = self.storage.delete_session_record(tenant).await {
                    warn!(tenant = %tenant, error = %e, "failed to delete session record");
                }
            }
            Effect::Unregister => {
                handle.cancel_timer();
                self.registry.remove(handle);
                gatehouse_prometheus::set_live_sessions(self.registry.len());
            }
            Effect::PublishStatus => {
                self.sink
                    .publish(tenant, RealtimeEvent::Status(session.status()));
            }
            Effect::PublishQr(qr) => {
                self.sink.publish(tenant, RealtimeEvent::Qr { qr });
            }
            Effect::ScheduleReconnect(delay) => {
                gatehouse_prometheus::record_reconnect_scheduled();
                info!(
                    tenant = %tenant,
                    attempt = session.reconnect_attempts,
                    max = self.policy.max_reconnect_attempts,
                    delay_ms = delay.as_millis() as u64,
                    "reconnect scheduled"
                );
                self.schedule(handle, delay);
            }
            Effect::ScheduleRestart(delay) => {
                gatehouse_prometheus::record_restart_scheduled();
                info!(
                    tenant = %tenant,
                    attempt = session.restart_attempts,
                    delay_ms = delay.as_millis() as u64,
                    "restart scheduled"
                );
                self.schedule(handle, delay);
            }
        }
    }

    fn schedule(self: &Arc<Self>, handle: &Arc<SessionHandle>, delay: Duration) {
        let token = self.shutdown.child_token();
        let id = handle.set_timer(token.clone());
        tokio::spawn(timer_task(self.clone(), handle.clone(), id, token, delay));
    }

    async fn fire_timer(self: &Arc<Self>, handle: &Arc<SessionHandle>, id: u64) {
        let _guard = handle.lock_ops().await;
        if !handle.take_timer(id) || !self.registry.is_current(handle) {
            return;
        }
        if let Err(e) = self.start_transport(handle, false).await {
            warn!(tenant = %handle.tenant(), error = %e, "scheduled connect failed");
        }
    }

    /// Current status from memory, then the persisted record, then the idle default.
    pub async fn get_status(&self, tenant: &TenantId) -> Result<SessionStatus, GatehouseError> {
        if let Some(handle) = self.registry.get(tenant) {
            return Ok(handle.status());
        }
        Ok(match self.storage.get_session_record(tenant).await? {
            Some(record) => SessionStatus::from_record(&record),
            None => SessionStatus::idle(tenant),
        })
    }

    /// Drop the current device pairing and start a fresh QR handshake.
    pub async fn force_new_qr(
        self: &Arc<Self>,
        tenant: &TenantId,
    ) -> Result<SessionStatus, GatehouseError> {
        let (handle, _guard) = self.lock_current(tenant).await;
        handle.cancel_timer();
        if let Some(client) = handle.detach() {
            logout_quietly(tenant, client).await;
        }
        if let Err(e) = self.auth.clear(tenant).await {
            // The client is gone; leave a state that a later connect retries.
            self.apply(&handle, LifecycleEvent::ConnectFailed(e.to_string()))
                .await;
            return Err(e);
        }
        info!(tenant = %tenant, "credentials wiped for new qr");
        self.start_transport(&handle, true).await
    }

    /// Log out and forget the tenant's session.
    ///
    /// Logout is best effort; credentials, the live entry and the persisted
    /// connection state are cleared regardless.
    pub async fn disconnect(
        self: &Arc<Self>,
        tenant: &TenantId,
    ) -> Result<SessionStatus, GatehouseError> {
        if let Some(handle) = self.registry.get(tenant) {
            let _guard = handle.lock_ops().await;
            if self.registry.is_current(&handle) {
                handle.cancel_timer();
                self.apply(&handle, LifecycleEvent::DisconnectStarted).await;
                if let Some(client) = handle.detach() {
                    logout_quietly(tenant, client).await;
                }
                self.apply(&handle, LifecycleEvent::Disconnected).await;
                gatehouse_prometheus::record_disconnect("requested");
                info!(tenant = %tenant, "session disconnected");
                return Ok(handle.status());
            }
        }

        self.auth.clear(tenant).await?;
        self.storage.mark_session_disconnected(tenant).await?;
        let status = SessionStatus::idle(tenant);
        self.sink
            .publish(tenant, RealtimeEvent::Status(status.clone()));
        Ok(status)
    }

    /// Wait for the tenant's current or next QR payload.
    pub async fn wait_for_qr(&self, tenant: &TenantId) -> Result<String, GatehouseError> {
        let handle = self
            .registry
            .get(tenant)
            .ok_or_else(|| GatehouseError::NotConnected {
                tenant: tenant.to_string(),
            })?;
        let mut rx = handle.subscribe_qr();
        let delay = self.config.qr_wait_delay();
        let attempts = self.config.qr_wait_attempts.max(1);

        for _ in 0..attempts {
            let current = rx.borrow_and_update().clone();
            if let Some(qr) = current {
                return Ok(qr);
            }
            if handle.session().state.is_open() {
                return Err(GatehouseError::AlreadyConnected {
                    tenant: tenant.to_string(),
                });
            }
            if let Ok(Err(_)) = tokio::time::timeout(delay, rx.changed()).await {
                break;
            }
        }
        let current = rx.borrow().clone();
        current.ok_or(GatehouseError::Timeout {
            duration: delay * attempts,
        })
    }

    /// Send text on the tenant's open session with bounded retries.
    ///
    /// The sent message is recorded as outgoing.
    pub async fn send_text(
        &self,
        tenant: &TenantId,
        chat_id: &str,
        text: &str,
    ) -> Result<String, GatehouseError> {
        let open = self
            .registry
            .get(tenant)
            .is_some_and(|h| h.session().state.is_open());
        if !open {
            return Err(GatehouseError::NotConnected {
                tenant: tenant.to_string(),
            });
        }

        let message_id = with_retries(
            self.config.send_retries,
            self.config.send_retry_delay(),
            |_| self.registry.send_text(tenant, chat_id, text),
        )
        .await
        .map_err(|exhausted| {
            gatehouse_prometheus::record_send_failure();
            match exhausted.last_error {
                e @ GatehouseError::NotConnected { .. } => e,
                e => GatehouseError::SendFailure {
                    tenant: tenant.to_string(),
                    chat_id: chat_id.to_string(),
                    attempts: exhausted.attempts,
                    message: e.to_string(),
                },
            }
        })?;

        if let Err(e) = self
            .ingest
            .record_outgoing(tenant, chat_id, text, &message_id)
            .await
        {
            warn!(tenant = %tenant, error = %e, "failed to record outgoing message");
        }
        Ok(message_id)
    }

    /// Reconnect tenants that were connected with stored credentials.
    ///
    /// Every record is marked disconnected first so a crash never leaves a
    /// record claiming a live connection. Returns the number of tenants
    /// whose connect was started.
    pub async fn restore_sessions(self: &Arc<Self>) -> Result<usize, GatehouseError> {
        let candidates: Vec<_> = self
            .storage
            .list_session_records(true)
            .await?
            .into_iter()
            .filter(|r| r.auth_data_ref.is_some())
            .collect();
        let reset = self.storage.mark_all_sessions_disconnected().await?;
        if reset > 0 {
            info!(count = reset, "stale connected records reset");
        }

        let mut restored = 0;
        for record in candidates {
            let tenant = TenantId::new(record.tenant_id);
            match self.connect(&tenant).await {
                Ok(_) => restored += 1,
                Err(e) => warn!(tenant = %tenant, error = %e, "session restore failed"),
            }
        }
        info!(restored, "sessions restored");
        Ok(restored)
    }

    /// Stop every driver and timer without logging out.
    pub async fn shutdown(&self) {
        self.shutdown.cancel();
        for handle in self.registry.handles() {
            let _guard = handle.lock_ops().await;
            handle.cancel_timer();
            if let Some(client) = handle.detach() {
                close_quietly(handle.tenant(), client).await;
            }
            if let Err(e) = self.storage.mark_session_disconnected(handle.tenant()).await {
                warn!(tenant = %handle.tenant(), error = %e, "failed to mark session disconnected");
            }
        }
        self.registry.clear();
        gatehouse_prometheus::set_live_sessions(0);
        info!("session controller stopped");
    }
}

fn driver_task(
    controller: Arc<SessionLifecycleController>,
    handle: Arc<SessionHandle>,
    generation: u64,
    mut events: mpsc::Receiver<TransportEvent>,
    cancel: CancellationToken,
) -> BoxFuture<'static, ()> {
    Box::pin(async move {
        loop {
            let event = tokio::select! {
                biased;
                _ = cancel.cancelled() => return,
                event = events.recv() => event,
            };
            match event {
                Some(event) => {
                    controller
                        .on_transport_event(&handle, generation, event)
                        .await
                }
                None => {
                    controller
                        .on_lifecycle_event(&handle, generation, LifecycleEvent::StreamEnded)
                        .await;
                    return;
                }
            }
        }
    })
}

fn timer_task(
    controller: Arc<SessionLifecycleController>,
    handle: Arc<SessionHandle>,
    id: u64,
    cancel: CancellationToken,
    delay: Duration,
) -> BoxFuture<'static, ()> {
    Box::pin(async move {
        tokio::select! {
            _ = cancel.cancelled() => {}
            _ = tokio::time::sleep(delay) => controller.fire_timer(&handle, id).await,
        }
    })
}

async fn close_quietly(tenant: &TenantId, client: Arc<dyn TransportClient>) {
    if let Err(e) = client.close().await {
        debug!(tenant = %tenant, error = %e, "transport close failed");
    }
}

async fn logout_quietly(tenant: &TenantId, client: Arc<dyn TransportClient>) {
    if let Err(e) = client.logout().await {
        warn!(tenant = %tenant, error = %e, "logout failed, clearing local state anyway");
    }
    close_quietly(tenant, client).await;
}
