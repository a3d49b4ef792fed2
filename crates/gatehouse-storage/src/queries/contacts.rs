// SPDX-FileCopyrightText: 2026 Gatehouse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Known-contact lookups used for sender resolution.

use gatehouse_core::GatehouseError;
use gatehouse_core::types::Contact;
use rusqlite::params;

use crate::database::{Database, map_tr_err};

/// Find a contact by normalized address within a tenant.
pub async fn find_by_address(
    db: &Database,
    tenant_id: &str,
    address: &str,
) -> Result<Option<Contact>, GatehouseError> {
    let tenant_id = tenant_id.to_string();
    let address = address.to_string();
    db.connection()
        .call(move |conn| {
            let result = conn.query_row(
                "SELECT id, tenant_id, name, address FROM contacts
                 WHERE tenant_id = ?1 AND address = ?2",
                params![tenant_id, address],
                |row| {
                    Ok(Contact {
                        id: row.get(0)?,
                        tenant_id: row.get(1)?,
                        name: row.get(2)?,
                        address: row.get(3)?,
                    })
                },
            );
            match result {
                Ok(contact) => Ok(Some(contact)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e),
            }
        })
        .await
        .map_err(map_tr_err)
}

/// Insert a contact, or rename the existing one with the same address.
pub async fn upsert_contact(
    db: &Database,
    tenant_id: &str,
    name: &str,
    address: &str,
) -> Result<Contact, GatehouseError> {
    let tenant_id = tenant_id.to_string();
    let name = name.to_string();
    let address = address.to_string();
    db.connection()
        .call(move |conn| {
            let id: i64 = conn.query_row(
                "INSERT INTO contacts (tenant_id, name, address) VALUES (?1, ?2, ?3)
                 ON CONFLICT(tenant_id, address) DO UPDATE SET name = excluded.name
                 RETURNING id",
                params![tenant_id, name, address],
                |row| row.get(0),
            )?;
            Ok(Contact {
                id,
                tenant_id,
                name,
                address,
            })
        })
        .await
        .map_err(map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries::test_support::setup_db;

    #[tokio::test]
    async fn upsert_then_find() {
        let (db, _dir) = setup_db().await;
        let created = upsert_contact(&db, "t1", "Ana", "628123").await.unwrap();
        let found = find_by_address(&db, "t1", "628123").await.unwrap().unwrap();
        assert_eq!(found, created);

        let renamed = upsert_contact(&db, "t1", "Ana B", "628123").await.unwrap();
        assert_eq!(renamed.id, created.id);
        assert_eq!(
            find_by_address(&db, "t1", "628123").await.unwrap().unwrap().name,
            "Ana B"
        );
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn lookup_is_tenant_scoped() {
        let (db, _dir) = setup_db().await;
        upsert_contact(&db, "t1", "Ana", "628123").await.unwrap();
        assert!(find_by_address(&db, "t2", "628123").await.unwrap().is_none());
        db.close().await.unwrap();
    }
}
