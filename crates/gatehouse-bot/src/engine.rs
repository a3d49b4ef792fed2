// SPDX-FileCopyrightText: 2026 Gatehouse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The auto-responder: picks a reply for an inbound message and delivers it.

use std::sync::Arc;

use gatehouse_config::model::BotConfig;
use gatehouse_core::types::{Contact, OrderItemRequest};
use gatehouse_core::{GatehouseError, OutboundSender, StorageAdapter, TenantId, with_retries};
use tracing::{debug, warn};

use crate::intent::{self, Intent};
use crate::order::parse_order_items;
use crate::render;

/// Outcome of handling one inbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BotReply {
    pub text: String,
    pub delivered: bool,
    /// External id of the sent reply, when delivered.
    pub message_id: Option<String>,
    pub attempts: u32,
}

/// Which rule produced a reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplySource {
    Greeting,
    Rule(i64),
    Catalog,
    Order,
    Status,
    Fallback,
}

/// Rule and command based responder.
pub struct BotResponseEngine {
    storage: Arc<dyn StorageAdapter>,
    sender: Arc<dyn OutboundSender>,
    config: BotConfig,
}

impl BotResponseEngine {
    pub fn new(
        storage: Arc<dyn StorageAdapter>,
        sender: Arc<dyn OutboundSender>,
        config: BotConfig,
    ) -> Self {
        Self {
            storage,
            sender,
            config,
        }
    }

    /// Compute the reply to `text` from `contact` without sending it.
    pub async fn respond(
        &self,
        tenant: &TenantId,
        contact: &Contact,
        text: &str,
    ) -> Result<(ReplySource, String), GatehouseError> {
        let normalized = intent::normalize(text);

        if self.config.greetings.iter().any(|g| g.trim().eq_ignore_ascii_case(&normalized)) {
            return Ok((ReplySource::Greeting, self.config.greeting_text.clone()));
        }

        let rules = self.storage.active_bot_rules(tenant).await?;
        if let Some(rule) = rules
            .iter()
            .find(|r| intent::normalize(&r.trigger_keyword) == normalized)
        {
            return Ok((ReplySource::Rule(rule.id), rule.response_text.clone()));
        }

        let currency = &self.config.currency;
        match intent::detect(&normalized) {
            Some(Intent::Catalog) => {
                let products = self.storage.list_products(tenant).await?;
                Ok((ReplySource::Catalog, render::catalog(&products, currency)))
            }
            Some(Intent::Order(args)) => {
                Ok((ReplySource::Order, self.place_order(tenant, contact, args).await?))
            }
            Some(Intent::Status) => {
                let orders = self.storage.recent_orders(tenant, contact.id, 5).await?;
                Ok((ReplySource::Status, render::order_status(&orders, currency)))
            }
            None => Ok((ReplySource::Fallback, self.config.fallback_text.clone())),
        }
    }

    async fn place_order(
        &self,
        tenant: &TenantId,
        contact: &Contact,
        args: &str,
    ) -> Result<String, GatehouseError> {
        let mut items = Vec::new();
        for token in parse_order_items(args) {
            match self.storage.find_product(tenant, &token.reference).await? {
                Some(product) => items.push(OrderItemRequest {
                    product_id: product.id,
                    quantity: token.quantity,
                }),
                None => debug!(tenant = %tenant, reference = %token.reference, "unknown product skipped"),
            }
        }
        if items.is_empty() {
            return Ok(render::NO_VALID_PRODUCTS.to_string());
        }

        let placement = self.storage.place_order(tenant, contact.id, &items).await?;
        Ok(render::order_placement(&placement, &self.config.currency))
    }

    /// Compute the reply and send it back to `chat_id` with bounded retries.
    ///
    /// A failed send is reported in the returned [`BotReply`], not as an error.
    pub async fn handle(
        &self,
        tenant: &TenantId,
        chat_id: &str,
        contact: &Contact,
        text: &str,
    ) -> Result<BotReply, GatehouseError> {
        let (source, reply) = self.respond(tenant, contact, text).await?;
        debug!(tenant = %tenant, chat_id, ?source, "bot reply selected");

        let mut attempts = 0;
        let sent = with_retries(
            self.config.send_retries,
            self.config.send_retry_delay(),
            |attempt| {
                attempts = attempt;
                self.sender.send_text(tenant, chat_id, &reply)
            },
        )
        .await;

        let out = match sent {
            Ok(message_id) => BotReply {
                text: reply,
                delivered: true,
                message_id: Some(message_id),
                attempts,
            },
            Err(exhausted) => {
                warn!(
                    tenant = %tenant,
                    chat_id,
                    attempts = exhausted.attempts,
                    error = %exhausted.last_error,
                    "bot reply could not be delivered"
                );
                gatehouse_prometheus::record_send_failure();
                BotReply {
                    text: reply,
                    delivered: false,
                    message_id: None,
                    attempts: exhausted.attempts,
                }
            }
        };
        gatehouse_prometheus::record_bot_reply(out.delivered);
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_test::traced_test;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};

    use async_trait::async_trait;
    use gatehouse_config::model::StorageConfig;
    use gatehouse_storage::SqliteStorage;
    use tempfile::TempDir;

    /// Fails the first `failures` sends, then succeeds.
    struct ScriptedSender {
        failures: u32,
        calls: AtomicU32,
        sent: Mutex<Vec<(String, String)>>,
    }

    impl ScriptedSender {
        fn new(failures: u32) -> Arc<Self> {
            Arc::new(Self {
                failures,
                calls: AtomicU32::new(0),
                sent: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl OutboundSender for ScriptedSender {
        async fn send_text(
            &self,
            _tenant: &TenantId,
            chat_id: &str,
            text: &str,
        ) -> Result<String, GatehouseError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if n <= self.failures {
                return Err(GatehouseError::transport("socket closed"));
            }
            self.sent
                .lock()
                .unwrap()
                .push((chat_id.to_string(), text.to_string()));
            Ok(format!("out-{n}"))
        }
    }

    struct Fixture {
        _dir: TempDir,
        storage: Arc<SqliteStorage>,
        tenant: TenantId,
        contact: Contact,
    }

    async fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bot.db");
        let storage = Arc::new(SqliteStorage::new(StorageConfig {
            database_path: path.to_str().unwrap().to_string(),
            wal_mode: true,
        }));
        storage.initialize().await.unwrap();
        let tenant = TenantId::new("shop-1");
        let contact = storage
            .upsert_contact(&tenant, "Budi", "628111")
            .await
            .unwrap();
        Fixture {
            _dir: dir,
            storage,
            tenant,
            contact,
        }
    }

    fn engine(f: &Fixture, sender: Arc<ScriptedSender>) -> BotResponseEngine {
        let config = BotConfig {
            send_retry_delay_ms: 10,
            ..BotConfig::default()
        };
        BotResponseEngine::new(f.storage.clone(), sender, config)
    }

    #[tokio::test]
    async fn greeting_wins_over_rules() {
        let f = fixture().await;
        f.storage
            .insert_bot_rule(&f.tenant, "hi", "rule reply", 100)
            .await
            .unwrap();
        let bot = engine(&f, ScriptedSender::new(0));

        let (source, text) = bot.respond(&f.tenant, &f.contact, "  HI ").await.unwrap();
        assert_eq!(source, ReplySource::Greeting);
        assert_eq!(text, BotConfig::default().greeting_text);
    }

    #[tokio::test]
    async fn highest_priority_rule_matches_exactly() {
        let f = fixture().await;
        f.storage
            .insert_bot_rule(&f.tenant, "Opening Hours", "9 to 5", 1)
            .await
            .unwrap();
        let top = f
            .storage
            .insert_bot_rule(&f.tenant, "opening hours", "10 to 6", 5)
            .await
            .unwrap();
        let bot = engine(&f, ScriptedSender::new(0));

        let (source, text) = bot
            .respond(&f.tenant, &f.contact, "opening hours")
            .await
            .unwrap();
        assert_eq!(source, ReplySource::Rule(top));
        assert_eq!(text, "10 to 6");

        let (source, _) = bot
            .respond(&f.tenant, &f.contact, "what are your opening hours")
            .await
            .unwrap();
        assert_eq!(source, ReplySource::Fallback);
    }

    #[tokio::test]
    async fn rules_are_tenant_scoped() {
        let f = fixture().await;
        f.storage
            .insert_bot_rule(&TenantId::new("other"), "price", "secret", 1)
            .await
            .unwrap();
        let bot = engine(&f, ScriptedSender::new(0));
        let (source, _) = bot.respond(&f.tenant, &f.contact, "price").await.unwrap();
        assert_eq!(source, ReplySource::Fallback);
    }

    #[tokio::test]
    async fn catalog_lists_products() {
        let f = fixture().await;
        f.storage
            .insert_product(&f.tenant, "Gaming Laptop", 1_500_000, 2)
            .await
            .unwrap();
        let bot = engine(&f, ScriptedSender::new(0));

        let (source, text) = bot
            .respond(&f.tenant, &f.contact, "Catalog please")
            .await
            .unwrap();
        assert_eq!(source, ReplySource::Catalog);
        assert!(text.contains("Gaming Laptop"));
        assert!(text.contains("IDR 15,000.00"));
    }

    #[tokio::test]
    async fn mixed_order_yields_one_line_item() {
        let f = fixture().await;
        let laptop = f
            .storage
            .insert_product(&f.tenant, "Gaming Laptop", 1_000, 5)
            .await
            .unwrap();
        let bot = engine(&f, ScriptedSender::new(0));

        let (source, text) = bot
            .respond(
                &f.tenant,
                &f.contact,
                "ORDER Gaming Laptop:1, bogus:-2, MouseXYZ:3",
            )
            .await
            .unwrap();
        assert_eq!(source, ReplySource::Order);
        assert!(text.contains("gaming laptop") || text.contains("Gaming Laptop"));

        let orders = f
            .storage
            .recent_orders(&f.tenant, f.contact.id, 10)
            .await
            .unwrap();
        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].lines.len(), 1);
        assert_eq!(orders[0].lines[0].product_id, laptop.id);
        assert_eq!(orders[0].lines[0].quantity, 1);
    }

    #[tokio::test]
    async fn order_without_valid_products_creates_nothing() {
        let f = fixture().await;
        let bot = engine(&f, ScriptedSender::new(0));

        let (_, text) = bot
            .respond(&f.tenant, &f.contact, "order nothing:1, x:y")
            .await
            .unwrap();
        assert_eq!(text, render::NO_VALID_PRODUCTS);
        let orders = f
            .storage
            .recent_orders(&f.tenant, f.contact.id, 10)
            .await
            .unwrap();
        assert!(orders.is_empty());
    }

    #[tokio::test]
    async fn out_of_stock_item_becomes_pending_demand() {
        let f = fixture().await;
        let mouse = f
            .storage
            .insert_product(&f.tenant, "Mouse", 500, 0)
            .await
            .unwrap();
        let bot = engine(&f, ScriptedSender::new(0));

        let (_, text) = bot
            .respond(&f.tenant, &f.contact, &format!("order {}:2", mouse.id))
            .await
            .unwrap();
        assert!(text.contains("none of the requested products"));

        let demand = f.storage.pending_demand(&f.tenant).await.unwrap();
        assert_eq!(demand.len(), 1);
        assert_eq!(demand[0].product_id, mouse.id);
        assert_eq!(demand[0].quantity, 2);
    }

    #[tokio::test]
    async fn status_lists_contact_orders() {
        let f = fixture().await;
        let bot = engine(&f, ScriptedSender::new(0));
        let (source, text) = bot
            .respond(&f.tenant, &f.contact, "status")
            .await
            .unwrap();
        assert_eq!(source, ReplySource::Status);
        assert!(text.contains("no orders"));
    }

    #[tokio::test]
    async fn handle_retries_until_delivered() {
        let f = fixture().await;
        let sender = ScriptedSender::new(2);
        let bot = engine(&f, sender.clone());

        let reply = bot
            .handle(&f.tenant, "628111@s.whatsapp.net", &f.contact, "hello")
            .await
            .unwrap();
        assert!(reply.delivered);
        assert_eq!(reply.attempts, 3);
        assert_eq!(reply.message_id.as_deref(), Some("out-3"));
        assert_eq!(sender.sent.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    #[traced_test]
    async fn handle_reports_undelivered_reply() {
        let f = fixture().await;
        let sender = ScriptedSender::new(u32::MAX);
        let bot = engine(&f, sender.clone());

        let reply = bot
            .handle(&f.tenant, "628111@s.whatsapp.net", &f.contact, "hello")
            .await
            .unwrap();
        assert!(!reply.delivered);
        assert_eq!(reply.attempts, 3);
        assert!(reply.message_id.is_none());
        assert_eq!(sender.calls.load(Ordering::SeqCst), 3);
        assert!(logs_contain("bot reply could not be delivered"));
    }
}
