// SPDX-FileCopyrightText: 2026 Gatehouse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Credential blob storage.

use gatehouse_core::GatehouseError;
use gatehouse_core::types::{AuthCredentials, now_timestamp};
use rusqlite::params;

use crate::database::{Database, map_tr_err};

/// Value stored in `sessions.auth_data_ref` for a tenant's credentials.
pub fn auth_data_ref(tenant_id: &str) -> String {
    gatehouse_core::TenantId::new(tenant_id).auth_data_ref()
}

pub async fn load(db: &Database, tenant_id: &str) -> Result<Option<AuthCredentials>, GatehouseError> {
    let tenant_id = tenant_id.to_string();
    db.connection()
        .call(move |conn| {
            match conn.query_row(
                "SELECT credentials FROM auth_state WHERE tenant_id = ?1",
                params![tenant_id],
                |row| row.get::<_, Vec<u8>>(0),
            ) {
                Ok(blob) => Ok(Some(AuthCredentials(blob))),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e),
            }
        })
        .await
        .map_err(map_tr_err)
}

pub async fn save(
    db: &Database,
    tenant_id: &str,
    credentials: &AuthCredentials,
) -> Result<(), GatehouseError> {
    let tenant_id = tenant_id.to_string();
    let blob = credentials.0.clone();
    let now = now_timestamp();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO auth_state (tenant_id, credentials, updated_at)
                 VALUES (?1, ?2, ?3)
                 ON CONFLICT(tenant_id) DO UPDATE SET
                     credentials = excluded.credentials,
                     updated_at = excluded.updated_at",
                params![tenant_id, blob, now],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Delete the credentials and detach them from the session record.
pub async fn clear(db: &Database, tenant_id: &str) -> Result<(), GatehouseError> {
    let tenant_id = tenant_id.to_string();
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            tx.execute("DELETE FROM auth_state WHERE tenant_id = ?1", params![tenant_id])?;
            tx.execute(
                "UPDATE sessions SET auth_data_ref = NULL WHERE tenant_id = ?1",
                params![tenant_id],
            )?;
            tx.commit()
        })
        .await
        .map_err(map_tr_err)
}
