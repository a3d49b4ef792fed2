// SPDX-FileCopyrightText: 2026 Gatehouse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Storage wrapper with injectable failures.
//!
//! Delegates to a real [`SqliteStorage`] and fails selected calls on demand,
//! so error paths of the controller and the reconciler can be driven
//! against an otherwise working database.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use gatehouse_core::types::{
    BotRule, Contact, Conversation, Message, Order, OrderItemRequest, OrderPlacement,
    PendingDemand, Product, SessionRecord,
};
use gatehouse_core::{
    AdapterType, AuthCredentials, AuthStateStore, GatehouseError, HealthStatus, PluginAdapter,
    StorageAdapter, TenantId,
};
use gatehouse_storage::SqliteStorage;
use tokio::sync::OwnedMutexGuard;

pub struct FaultyStorage {
    inner: Arc<SqliteStorage>,
    fail_clears: AtomicBool,
    failing_marks: Mutex<HashSet<TenantId>>,
    saves_started: AtomicU32,
    save_gate: Arc<tokio::sync::Mutex<()>>,
}

fn injected(what: &str) -> GatehouseError {
    GatehouseError::Internal(format!("injected {what} failure"))
}

impl FaultyStorage {
    pub fn new(inner: Arc<SqliteStorage>) -> Self {
        Self {
            inner,
            fail_clears: AtomicBool::new(false),
            failing_marks: Mutex::new(HashSet::new()),
            saves_started: AtomicU32::new(0),
            save_gate: Arc::new(tokio::sync::Mutex::new(())),
        }
    }

    /// Make every credential clear fail until reset.
    pub fn fail_clears(&self, fail: bool) {
        self.fail_clears.store(fail, Ordering::SeqCst);
    }

    /// Make `mark_session_disconnected` fail for `tenant`.
    pub fn fail_marks_for(&self, tenant: &TenantId) {
        self.failing_marks.lock().unwrap().insert(tenant.clone());
    }

    /// Block credential saves until the returned guard is dropped.
    pub async fn hold_saves(&self) -> OwnedMutexGuard<()> {
        self.save_gate.clone().lock_owned().await
    }

    /// Number of credential saves that have been entered.
    pub fn saves_started(&self) -> u32 {
        self.saves_started.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PluginAdapter for FaultyStorage {
    fn name(&self) -> &str {
        "faulty-sqlite"
    }

    fn version(&self) -> semver::Version {
        self.inner.version()
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Storage
    }

    async fn health_check(&self) -> Result<HealthStatus, GatehouseError> {
        self.inner.health_check().await
    }

    async fn shutdown(&self) -> Result<(), GatehouseError> {
        PluginAdapter::shutdown(&*self.inner).await
    }
}

#[async_trait]
impl StorageAdapter for FaultyStorage {
    async fn initialize(&self) -> Result<(), GatehouseError> {
        Ok(())
    }

    async fn close(&self) -> Result<(), GatehouseError> {
        self.inner.close().await
    }

    async fn get_session_record(
        &self,
        tenant: &TenantId,
    ) -> Result<Option<SessionRecord>, GatehouseError> {
        self.inner.get_session_record(tenant).await
    }

    async fn upsert_session_record(&self, record: &SessionRecord) -> Result<(), GatehouseError> {
        self.inner.upsert_session_record(record).await
    }

    async fn list_session_records(
        &self,
        connected_only: bool,
    ) -> Result<Vec<SessionRecord>, GatehouseError> {
        self.inner.list_session_records(connected_only).await
    }

    async fn mark_session_disconnected(&self, tenant: &TenantId) -> Result<bool, GatehouseError> {
        if self.failing_marks.lock().unwrap().contains(tenant) {
            return Err(injected("mark"));
        }
        self.inner.mark_session_disconnected(tenant).await
    }

    async fn mark_all_sessions_disconnected(&self) -> Result<usize, GatehouseError> {
        self.inner.mark_all_sessions_disconnected().await
    }

    async fn delete_session_record(&self, tenant: &TenantId) -> Result<(), GatehouseError> {
        self.inner.delete_session_record(tenant).await
    }

    async fn find_contact_by_address(
        &self,
        tenant: &TenantId,
        address: &str,
    ) -> Result<Option<Contact>, GatehouseError> {
        self.inner.find_contact_by_address(tenant, address).await
    }

    async fn upsert_contact(
        &self,
        tenant: &TenantId,
        name: &str,
        address: &str,
    ) -> Result<Contact, GatehouseError> {
        self.inner.upsert_contact(tenant, name, address).await
    }

    async fn find_or_create_conversation(
        &self,
        tenant: &TenantId,
        chat_id: &str,
        is_group: bool,
    ) -> Result<Conversation, GatehouseError> {
        self.inner
            .find_or_create_conversation(tenant, chat_id, is_group)
            .await
    }

    async fn insert_message_if_absent(&self, message: &Message) -> Result<bool, GatehouseError> {
        self.inner.insert_message_if_absent(message).await
    }

    async fn get_message(&self, message_id: &str) -> Result<Option<Message>, GatehouseError> {
        self.inner.get_message(message_id).await
    }

    async fn recent_messages(
        &self,
        tenant: &TenantId,
        chat_a: &str,
        chat_b: &str,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Message>, GatehouseError> {
        self.inner
            .recent_messages(tenant, chat_a, chat_b, limit, offset)
            .await
    }

    async fn active_bot_rules(&self, tenant: &TenantId) -> Result<Vec<BotRule>, GatehouseError> {
        self.inner.active_bot_rules(tenant).await
    }

    async fn insert_bot_rule(
        &self,
        tenant: &TenantId,
        trigger_keyword: &str,
        response_text: &str,
        priority: i64,
    ) -> Result<i64, GatehouseError> {
        self.inner
            .insert_bot_rule(tenant, trigger_keyword, response_text, priority)
            .await
    }

    async fn list_products(&self, tenant: &TenantId) -> Result<Vec<Product>, GatehouseError> {
        self.inner.list_products(tenant).await
    }

    async fn insert_product(
        &self,
        tenant: &TenantId,
        name: &str,
        price: i64,
        stock: i64,
    ) -> Result<Product, GatehouseError> {
        self.inner.insert_product(tenant, name, price, stock).await
    }

    async fn find_product(
        &self,
        tenant: &TenantId,
        reference: &str,
    ) -> Result<Option<Product>, GatehouseError> {
        self.inner.find_product(tenant, reference).await
    }

    async fn place_order(
        &self,
        tenant: &TenantId,
        contact_id: i64,
        items: &[OrderItemRequest],
    ) -> Result<OrderPlacement, GatehouseError> {
        self.inner.place_order(tenant, contact_id, items).await
    }

    async fn recent_orders(
        &self,
        tenant: &TenantId,
        contact_id: i64,
        limit: i64,
    ) -> Result<Vec<Order>, GatehouseError> {
        self.inner.recent_orders(tenant, contact_id, limit).await
    }

    async fn pending_demand(&self, tenant: &TenantId) -> Result<Vec<PendingDemand>, GatehouseError> {
        self.inner.pending_demand(tenant).await
    }
}

#[async_trait]
impl AuthStateStore for FaultyStorage {
    async fn load(&self, tenant: &TenantId) -> Result<Option<AuthCredentials>, GatehouseError> {
        AuthStateStore::load(&*self.inner, tenant).await
    }

    async fn save(
        &self,
        tenant: &TenantId,
        credentials: &AuthCredentials,
    ) -> Result<(), GatehouseError> {
        self.saves_started.fetch_add(1, Ordering::SeqCst);
        let _gate = self.save_gate.lock().await;
        AuthStateStore::save(&*self.inner, tenant, credentials).await
    }

    async fn clear(&self, tenant: &TenantId) -> Result<(), GatehouseError> {
        if self.fail_clears.load(Ordering::SeqCst) {
            return Err(injected("clear"));
        }
        AuthStateStore::clear(&*self.inner, tenant).await
    }
}
