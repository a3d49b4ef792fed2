// SPDX-FileCopyrightText: 2026 Gatehouse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Message persistence.

use gatehouse_core::GatehouseError;
use gatehouse_core::types::Message;
use rusqlite::{Row, params};

use crate::database::{Database, map_tr_err};

fn row_to_message(row: &Row<'_>) -> rusqlite::Result<Message> {
    Ok(Message {
        message_id: row.get(0)?,
        conversation_id: row.get(1)?,
        sender_id: row.get(2)?,
        content: row.get(3)?,
        is_outgoing: row.get(4)?,
        status: row.get(5)?,
        created_at: row.get(6)?,
    })
}

/// Insert a message unless one with the same `message_id` exists.
///
/// Returns `true` if the row was written. Concurrent duplicates race on the
/// UNIQUE constraint and exactly one of them wins.
pub async fn insert_if_absent(db: &Database, message: &Message) -> Result<bool, GatehouseError> {
    let message = message.clone();
    db.connection()
        .call(move |conn| {
            let inserted = conn.execute(
                "INSERT OR IGNORE INTO messages
                     (message_id, conversation_id, sender_id, content, is_outgoing, status, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    message.message_id,
                    message.conversation_id,
                    message.sender_id,
                    message.content,
                    message.is_outgoing,
                    message.status,
                    message.created_at,
                ],
            )?;
            Ok(inserted == 1)
        })
        .await
        .map_err(map_tr_err)
}

pub async fn get_message(db: &Database, message_id: &str) -> Result<Option<Message>, GatehouseError> {
    let message_id = message_id.to_string();
    db.connection()
        .call(move |conn| {
            match conn.query_row(
                "SELECT message_id, conversation_id, sender_id, content, is_outgoing, status, created_at
                 FROM messages WHERE message_id = ?1",
                params![message_id],
                row_to_message,
            ) {
                Ok(m) => Ok(Some(m)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e),
            }
        })
        .await
        .map_err(map_tr_err)
}

/// Newest-first messages of the tenant's conversations with `chat_a` or `chat_b`.
pub async fn recent_messages(
    db: &Database,
    tenant_id: &str,
    chat_a: &str,
    chat_b: &str,
    limit: i64,
    offset: i64,
) -> Result<Vec<Message>, GatehouseError> {
    let tenant_id = tenant_id.to_string();
    let chat_a = chat_a.to_string();
    let chat_b = chat_b.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT m.message_id, m.conversation_id, m.sender_id, m.content,
                        m.is_outgoing, m.status, m.created_at
                 FROM messages m
                 JOIN conversations c ON c.id = m.conversation_id
                 WHERE c.tenant_id = ?1 AND c.chat_id IN (?2, ?3)
                 ORDER BY m.created_at DESC, m.id DESC
                 LIMIT ?4 OFFSET ?5",
            )?;
            let rows = stmt.query_map(
                params![tenant_id, chat_a, chat_b, limit, offset],
                row_to_message,
            )?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}
