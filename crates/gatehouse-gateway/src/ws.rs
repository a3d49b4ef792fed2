// SPDX-FileCopyrightText: 2026 Gatehouse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Realtime event stream for one tenant.
//!
//! Server -> Client (JSON text frames), one per bus envelope:
//! ```json
//! {"tenant_id": "acme", "type": "qr", "qr": "..."}
//! {"tenant_id": "acme", "type": "new_message", "chat_id": "...", ...}
//! ```
//!
//! The first frame is the tenant's current status. Client frames other than
//! close are ignored.

use axum::{
    extract::{
        Path, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::{IntoResponse, Response},
};
use futures::{SinkExt, StreamExt};
use gatehouse_bus::Envelope;
use gatehouse_core::{RealtimeEvent, TenantId};
use tokio::sync::broadcast::error::RecvError;

use crate::error::ApiError;
use crate::server::GatewayState;

/// GET /v1/tenants/{tenant}/events
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<GatewayState>,
    Path(tenant): Path<String>,
) -> Response {
    let tenant = tenant.trim();
    if tenant.is_empty() {
        return ApiError::BadRequest("tenant id must not be empty".into()).into_response();
    }
    let tenant = TenantId::new(tenant);
    ws.on_upgrade(move |socket| handle_socket(socket, state, tenant))
}

async fn handle_socket(socket: WebSocket, state: GatewayState, tenant: TenantId) {
    let (mut ws_sender, mut ws_receiver) = socket.split();
    // Subscribe before the snapshot so no event falls between them.
    let mut events = state.bus.subscribe(&tenant);
    tracing::debug!(tenant = %tenant, "realtime subscriber attached");

    match state.controller.get_status(&tenant).await {
        Ok(status) => {
            let snapshot = Envelope::new(tenant.clone(), RealtimeEvent::Status(status));
            if send_envelope(&mut ws_sender, &snapshot).await.is_err() {
                return;
            }
        }
        Err(e) => tracing::warn!(tenant = %tenant, error = %e, "status snapshot failed"),
    }

    loop {
        tokio::select! {
            received = events.recv() => match received {
                Ok(envelope) => {
                    if send_envelope(&mut ws_sender, &envelope).await.is_err() {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(tenant = %tenant, skipped, "realtime subscriber lagged");
                }
                Err(RecvError::Closed) => break,
            },
            incoming = ws_receiver.next() => match incoming {
                Some(Ok(Message::Close(_))) | None | Some(Err(_)) => break,
                Some(Ok(_)) => {}
            },
        }
    }
    tracing::debug!(tenant = %tenant, "realtime subscriber detached");
}

async fn send_envelope<S>(sender: &mut S, envelope: &Envelope) -> Result<(), ()>
where
    S: SinkExt<Message> + Unpin,
{
    let json = match envelope.to_json() {
        Ok(json) => json,
        Err(e) => {
            tracing::error!(error = %e, "failed to serialize realtime event");
            return Ok(());
        }
    };
    sender.send(Message::Text(json.into())).await.map_err(|_| ())
}
