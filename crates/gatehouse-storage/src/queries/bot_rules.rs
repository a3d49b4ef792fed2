// SPDX-FileCopyrightText: 2026 Gatehouse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use gatehouse_core::GatehouseError;
use gatehouse_core::types::BotRule;
use rusqlite::params;

use crate::database::{Database, map_tr_err};

/// Active rules of a tenant, highest priority first (oldest first on ties).
pub async fn active_rules(db: &Database, tenant_id: &str) -> Result<Vec<BotRule>, GatehouseError> {
    let tenant_id = tenant_id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, tenant_id, trigger_keyword, response_text, priority, active
                 FROM bot_rules WHERE tenant_id = ?1 AND active = 1
                 ORDER BY priority DESC, id ASC",
            )?;
            let rows = stmt.query_map(params![tenant_id], |row| {
                Ok(BotRule {
                    id: row.get(0)?,
                    tenant_id: row.get(1)?,
                    trigger_keyword: row.get(2)?,
                    response_text: row.get(3)?,
                    priority: row.get(4)?,
                    active: row.get(5)?,
                })
            })?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}

pub async fn insert_rule(
    db: &Database,
    tenant_id: &str,
    trigger_keyword: &str,
    response_text: &str,
    priority: i64,
) -> Result<i64, GatehouseError> {
    let tenant_id = tenant_id.to_string();
    let trigger_keyword = trigger_keyword.to_string();
    let response_text = response_text.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO bot_rules (tenant_id, trigger_keyword, response_text, priority)
                 VALUES (?1, ?2, ?3, ?4)",
                params![tenant_id, trigger_keyword, response_text, priority],
            )?;
            Ok(conn.last_insert_rowid())
        })
        .await
        .map_err(map_tr_err)
}
