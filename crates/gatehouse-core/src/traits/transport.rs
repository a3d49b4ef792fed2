// SPDX-FileCopyrightText: 2026 Gatehouse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Interfaces to the external messaging transport.
//!
//! The protocol itself (handshake, encryption, framing) lives behind these
//! traits. A factory builds one client per tenant connection; the client's
//! events arrive in emission order on the returned channel.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::GatehouseError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{AuthCredentials, TenantId, TransportEvent};

/// A freshly built transport client together with its event stream.
pub struct TransportConnection {
    pub client: Arc<dyn TransportClient>,
    pub events: mpsc::Receiver<TransportEvent>,
}

impl std::fmt::Debug for TransportConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportConnection").finish_non_exhaustive()
    }
}

/// Builds transport clients for tenants.
#[async_trait]
pub trait TransportFactory: PluginAdapter {
    /// Builds a client for `tenant`.
    ///
    /// With `credentials` the client resumes an authorized device session;
    /// without, it starts the QR pairing handshake.
    async fn create(
        &self,
        tenant: &TenantId,
        credentials: Option<AuthCredentials>,
    ) -> Result<TransportConnection, GatehouseError>;
}

/// One tenant's live transport client.
#[async_trait]
pub trait TransportClient: Send + Sync + 'static {
    /// Sends a text message and returns its external message id.
    async fn send(&self, chat_id: &str, text: &str) -> Result<String, GatehouseError>;

    /// Logs the device out, invalidating its credentials on the remote side.
    async fn logout(&self) -> Result<(), GatehouseError>;

    /// Closes the socket without logging out. The event stream ends afterwards.
    async fn close(&self) -> Result<(), GatehouseError>;
}
