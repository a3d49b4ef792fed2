// SPDX-FileCopyrightText: 2026 Gatehouse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `gatehouse serve`: run the session stack, reconciler and gateway until
//! a shutdown signal arrives.

use std::sync::Arc;
use std::time::Instant;

use gatehouse_config::GatehouseConfig;
use gatehouse_core::{GatehouseError, StorageAdapter};
use gatehouse_gateway::{AuthConfig, GatewayState, HealthState, ServerConfig};
use gatehouse_prometheus::PrometheusAdapter;
use tracing::{debug, error, info, warn};

use crate::shutdown;
use crate::stack::Stack;

pub async fn run_serve(config: GatehouseConfig) -> Result<(), GatehouseError> {
    info!("starting gatehouse serve");

    // Fail closed: a gateway without a token would reject every call anyway.
    if config.gateway.enabled && config.gateway.bearer_token.is_none() {
        return Err(GatehouseError::Config(
            "gateway is enabled but gateway.bearer_token is not set".to_string(),
        ));
    }

    let prometheus = if config.gateway.metrics_enabled {
        match PrometheusAdapter::new() {
            Ok(adapter) => Some(Arc::new(adapter)),
            Err(e) => {
                warn!(error = %e, "prometheus initialization failed, continuing without metrics");
                None
            }
        }
    } else {
        debug!("prometheus metrics disabled by configuration");
        None
    };

    let stack = Stack::build(&config).await?;
    let cancel = shutdown::install_signal_handler();

    if config.daemon.restore_sessions {
        if let Err(e) = stack.controller.restore_sessions().await {
            warn!(error = %e, "session restore failed");
        }
    } else {
        // Nothing is live yet; no record may claim otherwise.
        let reset = stack.storage.mark_all_sessions_disconnected().await?;
        info!(count = reset, "session restore disabled, records reset");
    }

    let reconciler_task = if config.reconciler.enabled {
        let reconciler = stack.reconciler.clone();
        let token = cancel.clone();
        Some(tokio::spawn(async move { reconciler.run(token).await }))
    } else {
        info!("session reconciler disabled");
        None
    };

    let gateway_task = if config.gateway.enabled {
        let prometheus_render: Option<Arc<dyn Fn() -> String + Send + Sync>> =
            prometheus.as_ref().map(|adapter| {
                let adapter = adapter.clone();
                Arc::new(move || adapter.render()) as Arc<dyn Fn() -> String + Send + Sync>
            });
        let state = GatewayState {
            controller: stack.controller.clone(),
            reconciler: stack.reconciler.clone(),
            storage: stack.storage.clone(),
            bus: stack.bus.clone(),
            auth: AuthConfig {
                bearer_token: config.gateway.bearer_token.clone(),
            },
            health: HealthState {
                start_time: Instant::now(),
                prometheus_render,
            },
        };
        let server_config = ServerConfig {
            host: config.gateway.host.clone(),
            port: config.gateway.port,
        };
        let token = cancel.clone();
        Some(tokio::spawn(async move {
            if let Err(e) = gatehouse_gateway::start_server(&server_config, state, token.clone()).await {
                error!(error = %e, "gateway server failed");
                token.cancel();
            }
        }))
    } else {
        info!("gateway disabled by configuration");
        None
    };

    cancel.cancelled().await;
    info!("shutting down");

    for task in [gateway_task, reconciler_task].into_iter().flatten() {
        if let Err(e) = task.await {
            warn!(error = %e, "background task ended abnormally");
        }
    }
    stack.close().await?;

    info!("gatehouse serve shutdown complete");
    Ok(())
}
