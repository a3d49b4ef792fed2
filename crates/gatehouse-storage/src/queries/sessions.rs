// SPDX-FileCopyrightText: 2026 Gatehouse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Persisted session record operations.

use gatehouse_core::types::{SessionRecord, now_timestamp};
use gatehouse_core::{ConnectionState, GatehouseError};
use rusqlite::{Row, params};

use crate::database::{Database, map_tr_err};

const SELECT_COLUMNS: &str = "SELECT tenant_id, is_connected, connection_state, last_connected_at,
        qr_code, auth_data_ref, updated_at FROM sessions";

fn row_to_record(row: &Row<'_>) -> rusqlite::Result<SessionRecord> {
    Ok(SessionRecord {
        tenant_id: row.get(0)?,
        is_connected: row.get(1)?,
        connection_state: row.get(2)?,
        last_connected_at: row.get(3)?,
        qr_code: row.get(4)?,
        auth_data_ref: row.get(5)?,
        updated_at: row.get(6)?,
    })
}

/// Get the record of a tenant.
pub async fn get_session_record(
    db: &Database,
    tenant_id: &str,
) -> Result<Option<SessionRecord>, GatehouseError> {
    let tenant_id = tenant_id.to_string();
    db.connection()
        .call(move |conn| {
            let sql = format!("{SELECT_COLUMNS} WHERE tenant_id = ?1");
            match conn.query_row(&sql, params![tenant_id], row_to_record) {
                Ok(record) => Ok(Some(record)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e),
            }
        })
        .await
        .map_err(map_tr_err)
}

/// Insert or replace the record of `record.tenant_id`.
pub async fn upsert_session_record(
    db: &Database,
    record: &SessionRecord,
) -> Result<(), GatehouseError> {
    let record = record.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO sessions (tenant_id, is_connected, connection_state,
                     last_connected_at, qr_code, auth_data_ref, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                 ON CONFLICT(tenant_id) DO UPDATE SET
                     is_connected = excluded.is_connected,
                     connection_state = excluded.connection_state,
                     last_connected_at = excluded.last_connected_at,
                     qr_code = excluded.qr_code,
                     auth_data_ref = excluded.auth_data_ref,
                     updated_at = excluded.updated_at",
                params![
                    record.tenant_id,
                    record.is_connected,
                    record.connection_state,
                    record.last_connected_at,
                    record.qr_code,
                    record.auth_data_ref,
                    record.updated_at,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// List records, optionally only the ones marked connected.
pub async fn list_session_records(
    db: &Database,
    connected_only: bool,
) -> Result<Vec<SessionRecord>, GatehouseError> {
    db.connection()
        .call(move |conn| {
            let sql = if connected_only {
                format!("{SELECT_COLUMNS} WHERE is_connected = 1 ORDER BY tenant_id")
            } else {
                format!("{SELECT_COLUMNS} ORDER BY tenant_id")
            };
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map([], row_to_record)?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}

/// Mark a tenant's record disconnected and drop its QR.
///
/// Returns `false` if the tenant has no record.
pub async fn mark_session_disconnected(
    db: &Database,
    tenant_id: &str,
) -> Result<bool, GatehouseError> {
    let tenant_id = tenant_id.to_string();
    let now = now_timestamp();
    let idle = ConnectionState::Idle.to_string();
    db.connection()
        .call(move |conn| {
            let changed = conn.execute(
                "UPDATE sessions SET is_connected = 0, qr_code = NULL,
                     connection_state = ?2, updated_at = ?3
                 WHERE tenant_id = ?1",
                params![tenant_id, idle, now],
            )?;
            Ok(changed > 0)
        })
        .await
        .map_err(map_tr_err)
}

/// Mark every connected record disconnected.
///
/// Used at startup: no connection survives a process restart.
pub async fn mark_all_sessions_disconnected(db: &Database) -> Result<usize, GatehouseError> {
    let now = now_timestamp();
    let idle = ConnectionState::Idle.to_string();
    db.connection()
        .call(move |conn| {
            let changed = conn.execute(
                "UPDATE sessions SET is_connected = 0, qr_code = NULL,
                     connection_state = ?1, updated_at = ?2
                 WHERE is_connected = 1 OR qr_code IS NOT NULL",
                params![idle, now],
            )?;
            Ok(changed)
        })
        .await
        .map_err(map_tr_err)
}

pub async fn delete_session_record(db: &Database, tenant_id: &str) -> Result<(), GatehouseError> {
    let tenant_id = tenant_id.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute("DELETE FROM sessions WHERE tenant_id = ?1", params![tenant_id])?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries::test_support::setup_db;

    fn make_record(tenant: &str, connected: bool) -> SessionRecord {
        SessionRecord {
            tenant_id: tenant.to_string(),
            is_connected: connected,
            connection_state: if connected { "open" } else { "close" }.to_string(),
            last_connected_at: connected.then(|| "2026-01-01T00:00:00.000Z".to_string()),
            qr_code: (!connected).then(|| "2@qr".to_string()),
            auth_data_ref: Some(format!("auth_state:{tenant}")),
            updated_at: "2026-01-01T00:00:00.000Z".to_string(),
        }
    }

    #[tokio::test]
    async fn upsert_and_get_roundtrips() {
        let (db, _dir) = setup_db().await;
        let record = make_record("t1", true);
        upsert_session_record(&db, &record).await.unwrap();

        let got = get_session_record(&db, "t1").await.unwrap().unwrap();
        assert_eq!(got, record);
        assert!(get_session_record(&db, "nobody").await.unwrap().is_none());
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn upsert_keeps_one_row_per_tenant() {
        let (db, _dir) = setup_db().await;
        upsert_session_record(&db, &make_record("t1", false)).await.unwrap();
        upsert_session_record(&db, &make_record("t1", true)).await.unwrap();

        let all = list_session_records(&db, false).await.unwrap();
        assert_eq!(all.len(), 1);
        assert!(all[0].is_connected);
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn list_filters_connected() {
        let (db, _dir) = setup_db().await;
        upsert_session_record(&db, &make_record("a", true)).await.unwrap();
        upsert_session_record(&db, &make_record("b", false)).await.unwrap();

        let connected = list_session_records(&db, true).await.unwrap();
        assert_eq!(connected.len(), 1);
        assert_eq!(connected[0].tenant_id, "a");
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn mark_disconnected_clears_qr() {
        let (db, _dir) = setup_db().await;
        let mut record = make_record("t1", true);
        record.qr_code = Some("2@stale".into());
        upsert_session_record(&db, &record).await.unwrap();

        assert!(mark_session_disconnected(&db, "t1").await.unwrap());
        let got = get_session_record(&db, "t1").await.unwrap().unwrap();
        assert!(!got.is_connected);
        assert!(got.qr_code.is_none());
        assert_eq!(got.connection_state, "close");
        assert_eq!(got.last_connected_at, record.last_connected_at);

        assert!(!mark_session_disconnected(&db, "missing").await.unwrap());
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn mark_all_disconnected_counts_rows() {
        let (db, _dir) = setup_db().await;
        upsert_session_record(&db, &make_record("a", true)).await.unwrap();
        upsert_session_record(&db, &make_record("b", true)).await.unwrap();
        let mut idle = make_record("c", false);
        idle.qr_code = None;
        upsert_session_record(&db, &idle).await.unwrap();

        assert_eq!(mark_all_sessions_disconnected(&db).await.unwrap(), 2);
        assert!(list_session_records(&db, true).await.unwrap().is_empty());
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn delete_removes_record() {
        let (db, _dir) = setup_db().await;
        upsert_session_record(&db, &make_record("t1", true)).await.unwrap();
        delete_session_record(&db, "t1").await.unwrap();
        assert!(get_session_record(&db, "t1").await.unwrap().is_none());
        // Deleting again is fine.
        delete_session_record(&db, "t1").await.unwrap();
        db.close().await.unwrap();
    }
}
