// SPDX-FileCopyrightText: 2026 Gatehouse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Tenant-scoped publish/subscribe bus for realtime status and message events.
//!
//! Each tenant gets its own `tokio::sync::broadcast` channel, created lazily
//! on first subscription. Publishing to a tenant nobody listens to is a no-op.
//! Slow subscribers lag and lose the oldest events rather than blocking
//! publishers.

pub mod envelope;

use std::sync::Arc;

use dashmap::DashMap;
use gatehouse_core::{RealtimeEvent, RealtimeSink, TenantId};
use tokio::sync::broadcast;
use tracing::trace;

pub use envelope::Envelope;

/// Default per-tenant buffer.
pub const DEFAULT_CAPACITY: usize = 256;

/// In-process realtime event bus.
pub struct RealtimeEventBus {
    channels: DashMap<TenantId, broadcast::Sender<Arc<Envelope>>>,
    capacity: usize,
}

impl Default for RealtimeEventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl RealtimeEventBus {
    pub fn new(capacity: usize) -> Self {
        Self {
            channels: DashMap::new(),
            capacity: capacity.max(1),
        }
    }

    /// Subscribe to every event published for `tenant` from now on.
    pub fn subscribe(&self, tenant: &TenantId) -> broadcast::Receiver<Arc<Envelope>> {
        self.channels
            .entry(tenant.clone())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .subscribe()
    }

    pub fn subscriber_count(&self, tenant: &TenantId) -> usize {
        self.channels
            .get(tenant)
            .map(|tx| tx.receiver_count())
            .unwrap_or(0)
    }

    /// Tenants with a channel (subscribed at least once and not yet pruned).
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }
}

impl RealtimeSink for RealtimeEventBus {
    fn publish(&self, tenant: &TenantId, event: RealtimeEvent) {
        let kind = event.kind();
        let delivered = match self.channels.get(tenant) {
            Some(tx) => tx.send(Arc::new(Envelope::new(tenant.clone(), event))).unwrap_or(0),
            None => 0,
        };
        if delivered == 0 {
            // Drop channels whose subscribers all went away.
            self.channels
                .remove_if(tenant, |_, tx| tx.receiver_count() == 0);
        }
        trace!(tenant = %tenant, kind, delivered, "published realtime event");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gatehouse_core::SessionStatus;

    #[tokio::test]
    async fn subscriber_receives_tenant_events_only() {
        let bus = RealtimeEventBus::default();
        let t1 = TenantId::from("t1");
        let t2 = TenantId::from("t2");
        let mut rx = bus.subscribe(&t1);

        bus.publish(&t2, RealtimeEvent::Qr { qr: "other".into() });
        bus.publish(&t1, RealtimeEvent::Qr { qr: "mine".into() });

        let env = rx.recv().await.unwrap();
        assert_eq!(env.tenant_id, t1);
        assert_eq!(env.event, RealtimeEvent::Qr { qr: "mine".into() });
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn multiple_subscribers_each_get_a_copy() {
        let bus = RealtimeEventBus::default();
        let t = TenantId::from("t");
        let mut a = bus.subscribe(&t);
        let mut b = bus.subscribe(&t);
        assert_eq!(bus.subscriber_count(&t), 2);

        bus.publish(&t, RealtimeEvent::Status(SessionStatus::idle(&t)));
        assert_eq!(a.recv().await.unwrap().event.kind(), "status");
        assert_eq!(b.recv().await.unwrap().event.kind(), "status");
    }

    #[test]
    fn publish_without_subscribers_is_a_no_op() {
        let bus = RealtimeEventBus::default();
        bus.publish(&TenantId::from("nobody"), RealtimeEvent::HistorySynced { stored: 1 });
        assert_eq!(bus.channel_count(), 0);
    }

    #[test]
    fn abandoned_channels_are_pruned() {
        let bus = RealtimeEventBus::default();
        let t = TenantId::from("t");
        drop(bus.subscribe(&t));
        assert_eq!(bus.channel_count(), 1);
        bus.publish(&t, RealtimeEvent::HistorySynced { stored: 0 });
        assert_eq!(bus.channel_count(), 0);
    }

    #[tokio::test]
    async fn slow_subscriber_lags_instead_of_blocking() {
        let bus = RealtimeEventBus::new(2);
        let t = TenantId::from("t");
        let mut rx = bus.subscribe(&t);
        for n in 0..5 {
            bus.publish(&t, RealtimeEvent::HistorySynced { stored: n });
        }
        assert!(matches!(
            rx.recv().await,
            Err(broadcast::error::RecvError::Lagged(3))
        ));
        let next = rx.recv().await.unwrap();
        assert_eq!(next.event, RealtimeEvent::HistorySynced { stored: 3 });
    }
}
