// SPDX-FileCopyrightText: 2026 Gatehouse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Prometheus metrics adapter for the Gatehouse session gateway.
//!
//! Components record through the metrics-rs facade via the helpers in
//! [`recording`]; without an installed recorder those calls are no-ops.
//! The binary installs the Prometheus recorder once and the gateway renders
//! it at `/metrics`.

pub mod recording;

use async_trait::async_trait;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use gatehouse_core::{AdapterType, GatehouseError, HealthStatus, PluginAdapter};

pub use recording::{
    record_bot_reply, record_connect, record_disconnect, record_ingest, record_reconcile_cycle,
    record_reconnect_scheduled, record_restart_scheduled, record_send_failure, set_live_sessions,
};

/// Prometheus metrics adapter.
pub struct PrometheusAdapter {
    handle: PrometheusHandle,
}

impl PrometheusAdapter {
    /// Install the Prometheus recorder globally.
    ///
    /// Only one recorder can be installed per process; a second call fails.
    pub fn new() -> Result<Self, GatehouseError> {
        let handle = PrometheusBuilder::new().install_recorder().map_err(|e| {
            GatehouseError::Internal(format!("failed to install Prometheus recorder: {e}"))
        })?;

        recording::register_metrics();
        tracing::info!("prometheus metrics recorder installed");

        Ok(Self { handle })
    }

    /// Render all collected metrics in Prometheus text format.
    pub fn render(&self) -> String {
        self.handle.render()
    }
}

#[async_trait]
impl PluginAdapter for PrometheusAdapter {
    fn name(&self) -> &str {
        "prometheus"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Observability
    }

    async fn health_check(&self) -> Result<HealthStatus, GatehouseError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), GatehouseError> {
        Ok(())
    }
}
