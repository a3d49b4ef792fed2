// SPDX-FileCopyrightText: 2026 Gatehouse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Durable per-tenant credential storage.

use async_trait::async_trait;

use crate::error::GatehouseError;
use crate::types::{AuthCredentials, TenantId};

/// Stores the opaque transport credentials of each tenant.
///
/// The blob is never interpreted here; the transport owns its format.
#[async_trait]
pub trait AuthStateStore: Send + Sync + 'static {
    /// Loads the stored credentials, or `None` if the tenant has never paired.
    async fn load(&self, tenant: &TenantId) -> Result<Option<AuthCredentials>, GatehouseError>;

    /// Replaces the stored credentials.
    async fn save(
        &self,
        tenant: &TenantId,
        credentials: &AuthCredentials,
    ) -> Result<(), GatehouseError>;

    /// Removes the stored credentials. Clearing an absent entry succeeds.
    async fn clear(&self, tenant: &TenantId) -> Result<(), GatehouseError>;
}
