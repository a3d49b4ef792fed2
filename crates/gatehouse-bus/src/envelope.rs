// SPDX-FileCopyrightText: 2026 Gatehouse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use chrono::{DateTime, Utc};
use gatehouse_core::{RealtimeEvent, TenantId};
use serde::Serialize;

/// A published event as delivered to subscribers.
#[derive(Debug, Clone, Serialize)]
pub struct Envelope {
    pub id: String,
    pub tenant_id: TenantId,
    pub published_at: DateTime<Utc>,
    #[serde(flatten)]
    pub event: RealtimeEvent,
}

impl Envelope {
    pub fn new(tenant_id: TenantId, event: RealtimeEvent) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            tenant_id,
            published_at: Utc::now(),
            event,
        }
    }

    /// JSON text frame for socket subscribers.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_frame_flattens_event_tag() {
        let env = Envelope::new(
            TenantId::from("t1"),
            RealtimeEvent::HistorySynced { stored: 4 },
        );
        let value: serde_json::Value = serde_json::from_str(&env.to_json().unwrap()).unwrap();
        assert_eq!(value["type"], "history_synced");
        assert_eq!(value["stored"], 4);
        assert_eq!(value["tenant_id"], "t1");
        assert!(value["id"].as_str().is_some_and(|id| !id.is_empty()));
    }
}
