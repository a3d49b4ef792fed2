// SPDX-FileCopyrightText: 2026 Gatehouse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite implementation of the StorageAdapter and AuthStateStore traits.

use async_trait::async_trait;
use tokio::sync::OnceCell;
use tracing::debug;

use gatehouse_config::model::StorageConfig;
use gatehouse_core::types::{
    AuthCredentials, BotRule, Contact, Conversation, Message, Order, OrderItemRequest,
    OrderPlacement, PendingDemand, Product, SessionRecord, TenantId,
};
use gatehouse_core::{
    AdapterType, AuthStateStore, GatehouseError, HealthStatus, PluginAdapter, StorageAdapter,
};

use crate::database::{Database, map_tr_err};
use crate::queries;

/// SQLite-backed storage adapter.
///
/// Wraps a [`Database`] handle and delegates to the typed query modules.
/// The database is opened on the first call to [`StorageAdapter::initialize`].
pub struct SqliteStorage {
    config: StorageConfig,
    db: OnceCell<Database>,
}

impl SqliteStorage {
    /// Create a new SqliteStorage. Nothing is opened until `initialize`.
    pub fn new(config: StorageConfig) -> Self {
        Self {
            config,
            db: OnceCell::new(),
        }
    }

    /// The underlying database, or an error if not initialized.
    pub fn database(&self) -> Result<&Database, GatehouseError> {
        self.db.get().ok_or_else(|| GatehouseError::Storage {
            source: "storage not initialized -- call initialize() first".into(),
        })
    }

    async fn checkpoint(db: &Database) -> Result<(), GatehouseError> {
        db.connection()
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")
            })
            .await
            .map_err(map_tr_err)
    }
}

#[async_trait]
impl PluginAdapter for SqliteStorage {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Storage
    }

    async fn health_check(&self) -> Result<HealthStatus, GatehouseError> {
        self.database()?
            .connection()
            .call(|conn| -> Result<(), rusqlite::Error> { conn.execute_batch("SELECT 1;") })
            .await
            .map_err(map_tr_err)?;
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), GatehouseError> {
        if let Some(db) = self.db.get() {
            Self::checkpoint(db).await?;
            debug!("shutdown: WAL checkpoint complete");
        }
        Ok(())
    }
}

#[async_trait]
impl StorageAdapter for SqliteStorage {
    async fn initialize(&self) -> Result<(), GatehouseError> {
        let db = Database::open_with(&self.config.database_path, self.config.wal_mode).await?;
        self.db.set(db).map_err(|_| GatehouseError::Storage {
            source: "storage already initialized".into(),
        })?;
        debug!(path = %self.config.database_path, "SQLite storage initialized");
        Ok(())
    }

    async fn close(&self) -> Result<(), GatehouseError> {
        Self::checkpoint(self.database()?).await?;
        debug!("WAL checkpoint complete");
        Ok(())
    }

    // --- Session records ---

    async fn get_session_record(
        &self,
        tenant: &TenantId,
    ) -> Result<Option<SessionRecord>, GatehouseError> {
        queries::sessions::get_session_record(self.database()?, tenant.as_str()).await
    }

    async fn upsert_session_record(&self, record: &SessionRecord) -> Result<(), GatehouseError> {
        queries::sessions::upsert_session_record(self.database()?, record).await
    }

    async fn list_session_records(
        &self,
        connected_only: bool,
    ) -> Result<Vec<SessionRecord>, GatehouseError> {
        queries::sessions::list_session_records(self.database()?, connected_only).await
    }

    async fn mark_session_disconnected(&self, tenant: &TenantId) -> Result<bool, GatehouseError> {
        queries::sessions::mark_session_disconnected(self.database()?, tenant.as_str()).await
    }

    async fn mark_all_sessions_disconnected(&self) -> Result<usize, GatehouseError> {
        queries::sessions::mark_all_sessions_disconnected(self.database()?).await
    }

    async fn delete_session_record(&self, tenant: &TenantId) -> Result<(), GatehouseError> {
        queries::sessions::delete_session_record(self.database()?, tenant.as_str()).await
    }

    // --- Contacts and conversations ---

    async fn find_contact_by_address(
        &self,
        tenant: &TenantId,
        address: &str,
    ) -> Result<Option<Contact>, GatehouseError> {
        queries::contacts::find_by_address(self.database()?, tenant.as_str(), address).await
    }

    async fn upsert_contact(
        &self,
        tenant: &TenantId,
        name: &str,
        address: &str,
    ) -> Result<Contact, GatehouseError> {
        queries::contacts::upsert_contact(self.database()?, tenant.as_str(), name, address).await
    }

    async fn find_or_create_conversation(
        &self,
        tenant: &TenantId,
        chat_id: &str,
        is_group: bool,
    ) -> Result<Conversation, GatehouseError> {
        queries::conversations::find_or_create(self.database()?, tenant.as_str(), chat_id, is_group)
            .await
    }

    // --- Messages ---

    async fn insert_message_if_absent(&self, message: &Message) -> Result<bool, GatehouseError> {
        queries::messages::insert_if_absent(self.database()?, message).await
    }

    async fn get_message(&self, message_id: &str) -> Result<Option<Message>, GatehouseError> {
        queries::messages::get_message(self.database()?, message_id).await
    }

    async fn recent_messages(
        &self,
        tenant: &TenantId,
        chat_a: &str,
        chat_b: &str,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Message>, GatehouseError> {
        queries::messages::recent_messages(
            self.database()?,
            tenant.as_str(),
            chat_a,
            chat_b,
            limit,
            offset,
        )
        .await
    }

    // --- Bot rules and catalog ---

    async fn active_bot_rules(&self, tenant: &TenantId) -> Result<Vec<BotRule>, GatehouseError> {
        queries::bot_rules::active_rules(self.database()?, tenant.as_str()).await
    }

    async fn insert_bot_rule(
        &self,
        tenant: &TenantId,
        trigger_keyword: &str,
        response_text: &str,
        priority: i64,
    ) -> Result<i64, GatehouseError> {
        queries::bot_rules::insert_rule(
            self.database()?,
            tenant.as_str(),
            trigger_keyword,
            response_text,
            priority,
        )
        .await
    }

    async fn list_products(&self, tenant: &TenantId) -> Result<Vec<Product>, GatehouseError> {
        queries::catalog::list_products(self.database()?, tenant.as_str()).await
    }

    async fn insert_product(
        &self,
        tenant: &TenantId,
        name: &str,
        price: i64,
        stock: i64,
    ) -> Result<Product, GatehouseError> {
        queries::catalog::insert_product(self.database()?, tenant.as_str(), name, price, stock)
            .await
    }

    async fn find_product(
        &self,
        tenant: &TenantId,
        reference: &str,
    ) -> Result<Option<Product>, GatehouseError> {
        queries::catalog::find_product(self.database()?, tenant.as_str(), reference).await
    }

    async fn place_order(
        &self,
        tenant: &TenantId,
        contact_id: i64,
        items: &[OrderItemRequest],
    ) -> Result<OrderPlacement, GatehouseError> {
        queries::catalog::place_order(self.database()?, tenant.as_str(), contact_id, items).await
    }

    async fn recent_orders(
        &self,
        tenant: &TenantId,
        contact_id: i64,
        limit: i64,
    ) -> Result<Vec<Order>, GatehouseError> {
        queries::catalog::recent_orders(self.database()?, tenant.as_str(), contact_id, limit).await
    }

    async fn pending_demand(&self, tenant: &TenantId) -> Result<Vec<PendingDemand>, GatehouseError> {
        queries::catalog::pending_demand(self.database()?, tenant.as_str()).await
    }
}

#[async_trait]
impl AuthStateStore for SqliteStorage {
    async fn load(&self, tenant: &TenantId) -> Result<Option<AuthCredentials>, GatehouseError> {
        queries::auth_state::load(self.database()?, tenant.as_str()).await
    }

    async fn save(
        &self,
        tenant: &TenantId,
        credentials: &AuthCredentials,
    ) -> Result<(), GatehouseError> {
        queries::auth_state::save(self.database()?, tenant.as_str(), credentials).await
    }

    async fn clear(&self, tenant: &TenantId) -> Result<(), GatehouseError> {
        queries::auth_state::clear(self.database()?, tenant.as_str()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gatehouse_core::types::now_timestamp;
    use tempfile::tempdir;

    fn make_config(path: &str) -> StorageConfig {
        StorageConfig {
            database_path: path.to_string(),
            wal_mode: true,
        }
    }

    #[tokio::test]
    async fn sqlite_storage_implements_plugin_adapter() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let storage = SqliteStorage::new(make_config(db_path.to_str().unwrap()));

        assert_eq!(storage.name(), "sqlite");
        assert_eq!(storage.adapter_type(), AdapterType::Storage);
    }

    #[tokio::test]
    async fn initialize_twice_returns_error() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("double_init.db");
        let storage = SqliteStorage::new(make_config(db_path.to_str().unwrap()));

        storage.initialize().await.unwrap();
        assert!(db_path.exists());
        assert!(storage.initialize().await.is_err());
    }

    #[tokio::test]
    async fn health_check_requires_initialize() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("health.db");
        let storage = SqliteStorage::new(make_config(db_path.to_str().unwrap()));

        assert!(storage.health_check().await.is_err());
        storage.initialize().await.unwrap();
        assert_eq!(storage.health_check().await.unwrap(), HealthStatus::Healthy);
    }

    #[tokio::test]
    async fn session_and_credentials_through_adapter() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("lifecycle.db");
        let storage = SqliteStorage::new(make_config(db_path.to_str().unwrap()));
        storage.initialize().await.unwrap();
        let tenant = TenantId::from("tenant-1");

        let record = SessionRecord {
            tenant_id: tenant.to_string(),
            is_connected: true,
            connection_state: "open".into(),
            last_connected_at: Some(now_timestamp()),
            qr_code: None,
            auth_data_ref: Some(queries::auth_state::auth_data_ref(tenant.as_str())),
            updated_at: now_timestamp(),
        };
        storage.upsert_session_record(&record).await.unwrap();
        AuthStateStore::save(&storage, &tenant, &AuthCredentials(b"keys".to_vec()))
            .await
            .unwrap();

        assert_eq!(
            AuthStateStore::load(&storage, &tenant).await.unwrap(),
            Some(AuthCredentials(b"keys".to_vec()))
        );

        AuthStateStore::clear(&storage, &tenant).await.unwrap();
        let after = storage.get_session_record(&tenant).await.unwrap().unwrap();
        assert!(after.auth_data_ref.is_none());
        assert!(AuthStateStore::load(&storage, &tenant).await.unwrap().is_none());

        storage.shutdown().await.unwrap();
    }
}
