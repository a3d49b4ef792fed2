// SPDX-FileCopyrightText: 2026 Gatehouse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Wiring of the session stack from configuration.

use std::sync::Arc;

use gatehouse_bot::BotResponseEngine;
use gatehouse_bus::RealtimeEventBus;
use gatehouse_config::GatehouseConfig;
use gatehouse_core::{GatehouseError, StorageAdapter};
use gatehouse_ingest::MessageIngestPipeline;
use gatehouse_session::{ConnectionRegistry, SessionLifecycleController, SessionReconciler};
use gatehouse_storage::SqliteStorage;
use tracing::debug;

use crate::loopback::LoopbackTransportFactory;

pub struct Stack {
    pub storage: Arc<SqliteStorage>,
    pub bus: Arc<RealtimeEventBus>,
    pub controller: Arc<SessionLifecycleController>,
    pub reconciler: Arc<SessionReconciler>,
}

impl Stack {
    pub async fn build(config: &GatehouseConfig) -> Result<Self, GatehouseError> {
        let storage = Arc::new(SqliteStorage::new(config.storage.clone()));
        storage.initialize().await?;

        let bus = Arc::new(RealtimeEventBus::default());
        let transport = Arc::new(LoopbackTransportFactory::new(&config.transport));
        let registry = Arc::new(ConnectionRegistry::new());

        let bot = Arc::new(BotResponseEngine::new(
            storage.clone(),
            registry.clone(),
            config.bot.clone(),
        ));
        let ingest = Arc::new(MessageIngestPipeline::new(
            storage.clone(),
            bus.clone(),
            Some(bot),
            config.ingest.clone(),
        ));
        let controller = SessionLifecycleController::new(
            registry,
            storage.clone(),
            storage.clone(),
            transport,
            bus.clone(),
            ingest,
            config.session.clone(),
        );
        let reconciler = Arc::new(SessionReconciler::new(
            controller.clone(),
            storage.clone(),
            config.reconciler.clone(),
        ));
        debug!(
            database = %config.storage.database_path,
            transport = %config.transport.backend,
            "session stack ready"
        );

        Ok(Self {
            storage,
            bus,
            controller,
            reconciler,
        })
    }

    /// Stop sessions and checkpoint the database.
    pub async fn close(&self) -> Result<(), GatehouseError> {
        self.controller.shutdown().await;
        self.storage.close().await
    }
}
