// SPDX-FileCopyrightText: 2026 Gatehouse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use std::sync::Arc;

use chrono::DateTime;
use gatehouse_bot::BotResponseEngine;
use gatehouse_config::model::IngestConfig;
use gatehouse_core::types::{
    Contact, Message, format_timestamp, is_group_chat, normalize_address, now_timestamp,
};
use gatehouse_core::{
    GatehouseError, RawInboundEvent, RealtimeEvent, RealtimeSink, StorageAdapter, TenantId,
};
use strum::Display;
use tracing::{debug, info, warn};

/// Upper bound for one page of [`MessageIngestPipeline::recent_messages`].
pub const MAX_PAGE_SIZE: i64 = 200;

pub const STATUS_RECEIVED: &str = "received";
pub const STATUS_SENT: &str = "sent";
pub const STATUS_FAILED: &str = "failed";

/// Why an inbound event was not stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum DropReason {
    MissingMessageId,
    MissingChatId,
    NoTextBody,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestOutcome {
    /// First delivery; the row was written.
    Stored(Message),
    /// The message id already exists.
    Duplicate,
    Dropped(DropReason),
}

/// Validated fields of a raw inbound event.
struct Inbound<'a> {
    message_id: &'a str,
    chat_id: &'a str,
    text: &'a str,
}

fn validate(raw: &RawInboundEvent) -> Result<Inbound<'_>, DropReason> {
    let message_id = raw
        .message_id
        .as_deref()
        .filter(|id| !id.is_empty())
        .ok_or(DropReason::MissingMessageId)?;
    let chat_id = raw
        .chat_id
        .as_deref()
        .filter(|id| !id.is_empty())
        .ok_or(DropReason::MissingChatId)?;
    let text = raw
        .text
        .as_deref()
        .filter(|t| !t.trim().is_empty())
        .ok_or(DropReason::NoTextBody)?;
    Ok(Inbound {
        message_id,
        chat_id,
        text,
    })
}

/// Truncate to at most `max_chars` characters.
fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

fn event_timestamp(raw: &RawInboundEvent) -> String {
    raw.timestamp
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
        .map(format_timestamp)
        .unwrap_or_else(now_timestamp)
}

fn new_message_event(chat_id: &str, message: &Message) -> RealtimeEvent {
    RealtimeEvent::NewMessage {
        message_id: message.message_id.clone(),
        chat_id: chat_id.to_string(),
        content: message.content.clone(),
        is_outgoing: message.is_outgoing,
        sender_id: message.sender_id,
        created_at: message.created_at.clone(),
    }
}

/// Persists inbound and outbound messages and hands inbound ones to the bot.
pub struct MessageIngestPipeline {
    storage: Arc<dyn StorageAdapter>,
    sink: Arc<dyn RealtimeSink>,
    bot: Option<Arc<BotResponseEngine>>,
    config: IngestConfig,
}

impl MessageIngestPipeline {
    pub fn new(
        storage: Arc<dyn StorageAdapter>,
        sink: Arc<dyn RealtimeSink>,
        bot: Option<Arc<BotResponseEngine>>,
        config: IngestConfig,
    ) -> Self {
        Self {
            storage,
            sink,
            bot,
            config,
        }
    }

    async fn resolve_sender(
        &self,
        tenant: &TenantId,
        chat_id: &str,
    ) -> Result<Option<Contact>, GatehouseError> {
        let address = normalize_address(chat_id);
        if address.is_empty() {
            return Ok(None);
        }
        self.storage.find_contact_by_address(tenant, &address).await
    }

    /// Writes one message unless its id is already stored.
    #[allow(clippy::too_many_arguments)]
    async fn store(
        &self,
        tenant: &TenantId,
        chat_id: &str,
        message_id: &str,
        sender_id: Option<i64>,
        content: &str,
        is_outgoing: bool,
        status: &str,
        created_at: String,
    ) -> Result<Option<Message>, GatehouseError> {
        let conversation = self
            .storage
            .find_or_create_conversation(tenant, chat_id, is_group_chat(chat_id))
            .await?;
        let message = Message {
            message_id: message_id.to_string(),
            conversation_id: conversation.id,
            sender_id,
            content: truncate_chars(content, self.config.max_content_length).to_string(),
            is_outgoing,
            status: status.to_string(),
            created_at,
        };
        if self.storage.insert_message_if_absent(&message).await? {
            Ok(Some(message))
        } else {
            Ok(None)
        }
    }

    /// Ingest one live inbound event.
    ///
    /// On first delivery publishes `new_message` and, for inbound messages
    /// from a known contact, lets the bot reply. Bot failures never fail
    /// ingestion.
    pub async fn ingest(
        &self,
        tenant: &TenantId,
        raw: &RawInboundEvent,
    ) -> Result<IngestOutcome, GatehouseError> {
        let inbound = match validate(raw) {
            Ok(inbound) => inbound,
            Err(reason) => {
                debug!(tenant = %tenant, %reason, "inbound event dropped");
                gatehouse_prometheus::record_ingest("dropped");
                return Ok(IngestOutcome::Dropped(reason));
            }
        };

        let sender = if raw.from_me {
            None
        } else {
            self.resolve_sender(tenant, inbound.chat_id).await?
        };

        let stored = self
            .store(
                tenant,
                inbound.chat_id,
                inbound.message_id,
                sender.as_ref().map(|c| c.id),
                inbound.text,
                raw.from_me,
                if raw.from_me { STATUS_SENT } else { STATUS_RECEIVED },
                event_timestamp(raw),
            )
            .await?;

        let Some(message) = stored else {
            debug!(tenant = %tenant, message_id = inbound.message_id, "duplicate message ignored");
            gatehouse_prometheus::record_ingest("duplicate");
            return Ok(IngestOutcome::Duplicate);
        };
        gatehouse_prometheus::record_ingest("stored");
        self.sink
            .publish(tenant, new_message_event(inbound.chat_id, &message));

        if let Some(contact) = sender {
            self.reply(tenant, inbound.chat_id, &contact, inbound.text)
                .await;
        }
        Ok(IngestOutcome::Stored(message))
    }

    async fn reply(&self, tenant: &TenantId, chat_id: &str, contact: &Contact, text: &str) {
        let Some(bot) = self.bot.as_ref().filter(|_| self.config.bot_enabled) else {
            return;
        };
        if is_group_chat(chat_id) && !self.config.reply_in_groups {
            return;
        }

        let reply = match bot.handle(tenant, chat_id, contact, text).await {
            Ok(reply) => reply,
            Err(e) => {
                warn!(tenant = %tenant, chat_id, error = %e, "bot failed to produce a reply");
                return;
            }
        };

        let (message_id, status) = match reply.message_id {
            Some(id) if reply.delivered => (id, STATUS_SENT),
            _ => (format!("local-{}", uuid::Uuid::new_v4()), STATUS_FAILED),
        };
        if let Err(e) = self
            .record_with_status(tenant, chat_id, &reply.text, &message_id, status)
            .await
        {
            warn!(tenant = %tenant, chat_id, error = %e, "failed to record bot reply");
        }
    }

    /// Ingest a history batch delivered after pairing.
    ///
    /// Only messages in chats with known contacts are kept; the bot is never
    /// invoked. Outgoing rows carry no sender, as on the live path.
    /// Publishes a single `history_synced` event and returns the stored count.
    pub async fn ingest_history(
        &self,
        tenant: &TenantId,
        batch: &[RawInboundEvent],
    ) -> Result<usize, GatehouseError> {
        let mut stored = 0;
        for raw in batch {
            let Ok(inbound) = validate(raw) else {
                continue;
            };
            let Some(contact) = self.resolve_sender(tenant, inbound.chat_id).await? else {
                continue;
            };
            let written = self
                .store(
                    tenant,
                    inbound.chat_id,
                    inbound.message_id,
                    (!raw.from_me).then_some(contact.id),
                    inbound.text,
                    raw.from_me,
                    if raw.from_me { STATUS_SENT } else { STATUS_RECEIVED },
                    event_timestamp(raw),
                )
                .await?;
            if written.is_some() {
                stored += 1;
            }
        }
        info!(tenant = %tenant, received = batch.len(), stored, "history synced");
        self.sink
            .publish(tenant, RealtimeEvent::HistorySynced { stored });
        Ok(stored)
    }

    /// Record a message sent through the session layer.
    pub async fn record_outgoing(
        &self,
        tenant: &TenantId,
        chat_id: &str,
        text: &str,
        message_id: &str,
    ) -> Result<Option<Message>, GatehouseError> {
        self.record_with_status(tenant, chat_id, text, message_id, STATUS_SENT)
            .await
    }

    async fn record_with_status(
        &self,
        tenant: &TenantId,
        chat_id: &str,
        text: &str,
        message_id: &str,
        status: &str,
    ) -> Result<Option<Message>, GatehouseError> {
        let stored = self
            .store(tenant, chat_id, message_id, None, text, true, status, now_timestamp())
            .await?;
        if let Some(message) = &stored {
            self.sink.publish(tenant, new_message_event(chat_id, message));
        }
        Ok(stored)
    }

    /// Newest-first page of the conversation(s) with `chat_a` or `chat_b`.
    ///
    /// `limit` is clamped to `1..=MAX_PAGE_SIZE`; a negative offset reads as 0.
    pub async fn recent_messages(
        &self,
        tenant: &TenantId,
        chat_a: &str,
        chat_b: &str,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Message>, GatehouseError> {
        self.storage
            .recent_messages(
                tenant,
                chat_a,
                chat_b,
                limit.clamp(1, MAX_PAGE_SIZE),
                offset.max(0),
            )
            .await
    }
}
