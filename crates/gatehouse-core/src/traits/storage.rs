// SPDX-FileCopyrightText: 2026 Gatehouse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Storage adapter trait for persistence backends (SQLite, etc.).

use async_trait::async_trait;

use crate::error::GatehouseError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{
    BotRule, Contact, Conversation, Message, Order, OrderItemRequest, OrderPlacement,
    PendingDemand, Product, SessionRecord, TenantId,
};

/// Adapter for storage and persistence backends.
///
/// Owns the durable session records and the relational data the ingest
/// pipeline and the bot work against. All operations are tenant-scoped.
#[async_trait]
pub trait StorageAdapter: PluginAdapter {
    /// Initializes the storage backend (migrations, connection, etc.).
    async fn initialize(&self) -> Result<(), GatehouseError>;

    /// Closes the storage backend, flushing pending writes.
    async fn close(&self) -> Result<(), GatehouseError>;

    // --- Session records ---

    async fn get_session_record(
        &self,
        tenant: &TenantId,
    ) -> Result<Option<SessionRecord>, GatehouseError>;

    /// Inserts or replaces the single record of `record.tenant_id`.
    async fn upsert_session_record(&self, record: &SessionRecord) -> Result<(), GatehouseError>;

    /// Lists records, optionally only those marked connected.
    async fn list_session_records(
        &self,
        connected_only: bool,
    ) -> Result<Vec<SessionRecord>, GatehouseError>;

    /// Marks a record disconnected and clears its QR.
    ///
    /// Returns `false` when no record exists.
    async fn mark_session_disconnected(&self, tenant: &TenantId) -> Result<bool, GatehouseError>;

    /// Marks every connected record disconnected (crash recovery at startup).
    async fn mark_all_sessions_disconnected(&self) -> Result<usize, GatehouseError>;

    async fn delete_session_record(&self, tenant: &TenantId) -> Result<(), GatehouseError>;

    // --- Contacts and conversations ---

    /// Finds a known contact by its normalized address.
    async fn find_contact_by_address(
        &self,
        tenant: &TenantId,
        address: &str,
    ) -> Result<Option<Contact>, GatehouseError>;

    async fn upsert_contact(
        &self,
        tenant: &TenantId,
        name: &str,
        address: &str,
    ) -> Result<Contact, GatehouseError>;

    async fn find_or_create_conversation(
        &self,
        tenant: &TenantId,
        chat_id: &str,
        is_group: bool,
    ) -> Result<Conversation, GatehouseError>;

    // --- Messages ---

    /// Inserts a message unless its `message_id` already exists.
    ///
    /// Returns `true` when a row was written.
    async fn insert_message_if_absent(&self, message: &Message) -> Result<bool, GatehouseError>;

    async fn get_message(&self, message_id: &str) -> Result<Option<Message>, GatehouseError>;

    /// Newest-first messages in the tenant's conversations with `chat_a` or `chat_b`.
    async fn recent_messages(
        &self,
        tenant: &TenantId,
        chat_a: &str,
        chat_b: &str,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Message>, GatehouseError>;

    // --- Bot rules and catalog ---

    /// Active rules of a tenant, highest priority first.
    async fn active_bot_rules(&self, tenant: &TenantId) -> Result<Vec<BotRule>, GatehouseError>;

    async fn insert_bot_rule(
        &self,
        tenant: &TenantId,
        trigger_keyword: &str,
        response_text: &str,
        priority: i64,
    ) -> Result<i64, GatehouseError>;

    /// Active products of a tenant ordered by name.
    async fn list_products(&self, tenant: &TenantId) -> Result<Vec<Product>, GatehouseError>;

    async fn insert_product(
        &self,
        tenant: &TenantId,
        name: &str,
        price: i64,
        stock: i64,
    ) -> Result<Product, GatehouseError>;

    /// Resolves an active product by numeric id or case-insensitive name.
    async fn find_product(
        &self,
        tenant: &TenantId,
        reference: &str,
    ) -> Result<Option<Product>, GatehouseError>;

    /// Reserves stock and creates an order in one transaction.
    ///
    /// Lines without available stock are left out of the order; every
    /// unreserved quantity is recorded as pending demand.
    async fn place_order(
        &self,
        tenant: &TenantId,
        contact_id: i64,
        items: &[OrderItemRequest],
    ) -> Result<OrderPlacement, GatehouseError>;

    async fn recent_orders(
        &self,
        tenant: &TenantId,
        contact_id: i64,
        limit: i64,
    ) -> Result<Vec<Order>, GatehouseError>;

    async fn pending_demand(&self, tenant: &TenantId) -> Result<Vec<PendingDemand>, GatehouseError>;
}
