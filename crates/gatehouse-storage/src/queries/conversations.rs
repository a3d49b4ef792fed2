// SPDX-FileCopyrightText: 2026 Gatehouse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use gatehouse_core::GatehouseError;
use gatehouse_core::types::Conversation;
use rusqlite::params;

use crate::database::{Database, map_tr_err};

/// Return the conversation for (`chat_id`, `tenant_id`), creating it on first use.
///
/// `is_group` only applies on creation.
pub async fn find_or_create(
    db: &Database,
    tenant_id: &str,
    chat_id: &str,
    is_group: bool,
) -> Result<Conversation, GatehouseError> {
    let tenant_id = tenant_id.to_string();
    let chat_id = chat_id.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT OR IGNORE INTO conversations (chat_id, tenant_id, is_group)
                 VALUES (?1, ?2, ?3)",
                params![chat_id, tenant_id, is_group],
            )?;
            conn.query_row(
                "SELECT id, chat_id, tenant_id, is_group, created_at FROM conversations
                 WHERE chat_id = ?1 AND tenant_id = ?2",
                params![chat_id, tenant_id],
                |row| {
                    Ok(Conversation {
                        id: row.get(0)?,
                        chat_id: row.get(1)?,
                        tenant_id: row.get(2)?,
                        is_group: row.get(3)?,
                        created_at: row.get(4)?,
                    })
                },
            )
        })
        .await
        .map_err(map_tr_err)
}
