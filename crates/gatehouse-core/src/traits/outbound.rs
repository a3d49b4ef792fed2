// SPDX-FileCopyrightText: 2026 Gatehouse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use async_trait::async_trait;

use crate::error::GatehouseError;
use crate::types::TenantId;

/// Single-attempt text send through a tenant's live transport client.
///
/// Retry policy belongs to the caller.
#[async_trait]
pub trait OutboundSender: Send + Sync + 'static {
    /// Sends `text` to `chat_id` and returns the external message id.
    async fn send_text(
        &self,
        tenant: &TenantId,
        chat_id: &str,
        text: &str,
    ) -> Result<String, GatehouseError>;
}
