// SPDX-FileCopyrightText: 2026 Gatehouse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::types::{RealtimeEvent, TenantId};

/// Tenant-scoped publish sink for status and message events.
///
/// Publishing never fails from the caller's point of view: an event with no
/// subscribers is dropped.
pub trait RealtimeSink: Send + Sync + 'static {
    fn publish(&self, tenant: &TenantId, event: RealtimeEvent);
}
