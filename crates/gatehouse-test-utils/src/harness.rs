// SPDX-FileCopyrightText: 2026 Gatehouse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Full session stack over a temporary database.
//!
//! Delays are shortened to milliseconds so timer-driven behavior can be
//! observed with real time.

use std::sync::Arc;
use std::time::Duration;

use gatehouse_bot::BotResponseEngine;
use gatehouse_bus::RealtimeEventBus;
use gatehouse_config::model::{
    BotConfig, IngestConfig, ReconcilerConfig, SessionConfig, StorageConfig,
};
use gatehouse_core::{ConnectionState, GatehouseError, StorageAdapter, TenantId};
use gatehouse_ingest::MessageIngestPipeline;
use gatehouse_session::{ConnectionRegistry, SessionLifecycleController, SessionReconciler};
use gatehouse_storage::SqliteStorage;
use tempfile::TempDir;

use crate::faulty_storage::FaultyStorage;
use crate::mock_transport::MockTransportFactory;

pub struct TestHarnessBuilder {
    session: SessionConfig,
    reconciler: ReconcilerConfig,
    ingest: IngestConfig,
    bot: BotConfig,
}

impl TestHarnessBuilder {
    fn new() -> Self {
        Self {
            session: SessionConfig {
                max_reconnect_attempts: 3,
                reconnect_delay_ms: 20,
                max_restart_attempts: 2,
                restart_delay_ms: 10,
                qr_wait_attempts: 5,
                qr_wait_delay_ms: 20,
                send_retries: 2,
                send_retry_delay_ms: 5,
            },
            reconciler: ReconcilerConfig {
                enabled: true,
                cleanup_interval_secs: 60,
                stale_timeout_secs: 3_600,
            },
            ingest: IngestConfig::default(),
            bot: BotConfig {
                send_retries: 2,
                send_retry_delay_ms: 5,
                ..BotConfig::default()
            },
        }
    }

    pub fn session(mut self, f: impl FnOnce(&mut SessionConfig)) -> Self {
        f(&mut self.session);
        self
    }

    pub fn reconciler(mut self, f: impl FnOnce(&mut ReconcilerConfig)) -> Self {
        f(&mut self.reconciler);
        self
    }

    pub fn ingest(mut self, f: impl FnOnce(&mut IngestConfig)) -> Self {
        f(&mut self.ingest);
        self
    }

    pub async fn build(self) -> Result<TestHarness, GatehouseError> {
        let dir = TempDir::new().map_err(|e| GatehouseError::Storage { source: e.into() })?;
        let storage = Arc::new(SqliteStorage::new(StorageConfig {
            database_path: dir.path().join("test.db").to_string_lossy().to_string(),
            wal_mode: true,
        }));
        storage.initialize().await?;
        let faults = Arc::new(FaultyStorage::new(storage.clone()));

        let bus = Arc::new(RealtimeEventBus::new(256));
        let transport = Arc::new(MockTransportFactory::new());
        let registry = Arc::new(ConnectionRegistry::new());
        let bot = Arc::new(BotResponseEngine::new(
            storage.clone(),
            registry.clone(),
            self.bot,
        ));
        let ingest = Arc::new(MessageIngestPipeline::new(
            storage.clone(),
            bus.clone(),
            Some(bot),
            self.ingest,
        ));
        let controller = SessionLifecycleController::new(
            registry.clone(),
            faults.clone(),
            faults.clone(),
            transport.clone(),
            bus.clone(),
            ingest,
            self.session,
        );
        let reconciler = Arc::new(SessionReconciler::new(
            controller.clone(),
            faults.clone(),
            self.reconciler,
        ));

        Ok(TestHarness {
            _dir: dir,
            storage,
            faults,
            bus,
            transport,
            registry,
            controller,
            reconciler,
        })
    }
}

pub struct TestHarness {
    _dir: TempDir,
    pub storage: Arc<SqliteStorage>,
    /// The controller and reconciler see storage through this wrapper.
    pub faults: Arc<FaultyStorage>,
    pub bus: Arc<RealtimeEventBus>,
    pub transport: Arc<MockTransportFactory>,
    pub registry: Arc<ConnectionRegistry>,
    pub controller: Arc<SessionLifecycleController>,
    pub reconciler: Arc<SessionReconciler>,
}

impl TestHarness {
    pub fn builder() -> TestHarnessBuilder {
        TestHarnessBuilder::new()
    }

    pub async fn new() -> Result<Self, GatehouseError> {
        Self::builder().build().await
    }

    /// Poll `check` every 5ms for up to two seconds.
    pub async fn eventually(&self, what: &str, mut check: impl FnMut() -> bool) {
        for _ in 0..400 {
            if check() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("timed out waiting for {what}");
    }

    /// Wait until the in-memory state of `tenant` is `state`.
    pub async fn wait_for_state(&self, tenant: &TenantId, state: ConnectionState) {
        self.eventually(&format!("{tenant} to reach {state}"), || {
            self.registry
                .get(tenant)
                .is_some_and(|h| h.session().state == state)
        })
        .await;
    }
}
