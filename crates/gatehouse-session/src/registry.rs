// SPDX-FileCopyrightText: 2026 Gatehouse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Tenant-keyed registry of live sessions.
//!
//! Each tenant has at most one [`SessionHandle`]. Map operations are atomic
//! per key; everything that must not interleave for one tenant (connect,
//! disconnect, QR reset, timer firing) takes the handle's `op_lock`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use dashmap::DashMap;
use gatehouse_core::{
    GatehouseError, OutboundSender, SessionStatus, TenantId, TransportClient,
};
use tokio::sync::{OwnedMutexGuard, watch};
use tokio_util::sync::CancellationToken;

use crate::fsm::{Session, Transition};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// The live transport client and the task draining its events.
struct Attachment {
    client: Arc<dyn TransportClient>,
    driver: CancellationToken,
}

/// Live state of one tenant.
pub struct SessionHandle {
    tenant: TenantId,
    session: Mutex<Session>,
    op_lock: Arc<tokio::sync::Mutex<()>>,
    generation: AtomicU64,
    attachment: Mutex<Option<Attachment>>,
    timer: Mutex<Option<(u64, CancellationToken)>>,
    timer_seq: AtomicU64,
    qr: watch::Sender<Option<String>>,
}

impl SessionHandle {
    fn new(tenant: TenantId) -> Self {
        let (qr, _) = watch::channel(None);
        Self {
            session: Mutex::new(Session::new(tenant.clone())),
            tenant,
            op_lock: Arc::new(tokio::sync::Mutex::new(())),
            generation: AtomicU64::new(0),
            attachment: Mutex::new(None),
            timer: Mutex::new(None),
            timer_seq: AtomicU64::new(0),
            qr,
        }
    }

    pub fn tenant(&self) -> &TenantId {
        &self.tenant
    }

    pub fn session(&self) -> Session {
        lock(&self.session).clone()
    }

    pub fn status(&self) -> SessionStatus {
        lock(&self.session).status()
    }

    /// Atomically advance the session and mirror its QR into the watch channel.
    pub(crate) fn transition(&self, f: impl FnOnce(&Session) -> Transition) -> Transition {
        let transition = {
            let mut session = lock(&self.session);
            let transition = f(&session);
            *session = transition.session.clone();
            transition
        };
        let qr = transition.session.qr.clone();
        self.qr.send_if_modified(|current| {
            if *current == qr {
                false
            } else {
                *current = qr;
                true
            }
        });
        transition
    }

    /// Serialize an operation on this tenant.
    pub(crate) async fn lock_ops(&self) -> OwnedMutexGuard<()> {
        self.op_lock.clone().lock_owned().await
    }

    pub fn subscribe_qr(&self) -> watch::Receiver<Option<String>> {
        self.qr.subscribe()
    }

    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    pub fn client(&self) -> Option<Arc<dyn TransportClient>> {
        lock(&self.attachment).as_ref().map(|a| a.client.clone())
    }

    /// Install a new client, superseding any previous one.
    ///
    /// Returns the new generation and the token scoping its driver task.
    pub(crate) fn attach(
        &self,
        client: Arc<dyn TransportClient>,
        driver: CancellationToken,
    ) -> u64 {
        let mut slot = lock(&self.attachment);
        if let Some(old) = slot.take() {
            old.driver.cancel();
        }
        *slot = Some(Attachment { client, driver });
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Remove the current client. Events still queued for it are ignored.
    pub(crate) fn detach(&self) -> Option<Arc<dyn TransportClient>> {
        let old = lock(&self.attachment).take();
        self.generation.fetch_add(1, Ordering::SeqCst);
        old.map(|a| {
            a.driver.cancel();
            a.client
        })
    }

    /// Store a pending timer, cancelling the previous one. Returns its id.
    pub(crate) fn set_timer(&self, token: CancellationToken) -> u64 {
        let id = self.timer_seq.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some((_, old)) = lock(&self.timer).replace((id, token)) {
            old.cancel();
        }
        id
    }

    pub(crate) fn cancel_timer(&self) {
        if let Some((_, old)) = lock(&self.timer).take() {
            old.cancel();
        }
    }

    /// Claim the timer slot for firing. Fails if the timer was replaced or cancelled.
    pub(crate) fn take_timer(&self, id: u64) -> bool {
        let mut slot = lock(&self.timer);
        match slot.as_ref() {
            Some((current, token)) if *current == id && !token.is_cancelled() => {
                *slot = None;
                true
            }
            _ => false,
        }
    }

    pub fn has_pending_timer(&self) -> bool {
        lock(&self.timer).is_some()
    }

    /// Whether an operation currently holds this tenant's lock.
    pub fn is_busy(&self) -> bool {
        self.op_lock.try_lock().is_err()
    }
}

#[derive(Default)]
pub struct ConnectionRegistry {
    entries: DashMap<TenantId, Arc<SessionHandle>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, tenant: &TenantId) -> Option<Arc<SessionHandle>> {
        self.entries.get(tenant).map(|e| e.value().clone())
    }

    pub fn get_or_insert(&self, tenant: &TenantId) -> Arc<SessionHandle> {
        self.entries
            .entry(tenant.clone())
            .or_insert_with(|| Arc::new(SessionHandle::new(tenant.clone())))
            .value()
            .clone()
    }

    /// Remove `handle` if it is still the registered entry of its tenant.
    pub fn remove(&self, handle: &Arc<SessionHandle>) -> bool {
        self.entries
            .remove_if(handle.tenant(), |_, current| Arc::ptr_eq(current, handle))
            .is_some()
    }

    pub fn is_current(&self, handle: &Arc<SessionHandle>) -> bool {
        self.get(handle.tenant())
            .is_some_and(|current| Arc::ptr_eq(&current, handle))
    }

    pub fn handles(&self) -> Vec<Arc<SessionHandle>> {
        self.entries.iter().map(|e| e.value().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&self) {
        self.entries.clear();
    }
}

#[async_trait]
impl OutboundSender for ConnectionRegistry {
    async fn send_text(
        &self,
        tenant: &TenantId,
        chat_id: &str,
        text: &str,
    ) -> Result<String, GatehouseError> {
        let not_connected = || GatehouseError::NotConnected {
            tenant: tenant.to_string(),
        };
        let handle = self.get(tenant).ok_or_else(not_connected)?;
        if !handle.session().state.is_open() {
            return Err(not_connected());
        }
        let client = handle.client().ok_or_else(not_connected)?;
        client.send(chat_id, text).await
    }
}
