// SPDX-FileCopyrightText: 2026 Gatehouse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Gateway HTTP server built on axum.
//!
//! Sets up routes, middleware, and shared state for the gateway.

use std::sync::Arc;

use axum::{
    Router, middleware as axum_middleware,
    routing::{get, post},
};
use gatehouse_bus::RealtimeEventBus;
use gatehouse_core::{GatehouseError, StorageAdapter};
use gatehouse_session::{SessionLifecycleController, SessionReconciler};
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::auth::{AuthConfig, auth_middleware};
use crate::handlers;
use crate::ws;

/// Health state for unauthenticated health/metrics endpoints.
#[derive(Clone)]
pub struct HealthState {
    /// Process start time for uptime calculation.
    pub start_time: std::time::Instant,
    /// Optional Prometheus metrics render function.
    pub prometheus_render: Option<Arc<dyn Fn() -> String + Send + Sync>>,
}

/// Shared state for axum request handlers.
#[derive(Clone)]
pub struct GatewayState {
    pub controller: Arc<SessionLifecycleController>,
    pub reconciler: Arc<SessionReconciler>,
    /// Direct storage access for catalog and contact management.
    pub storage: Arc<dyn StorageAdapter>,
    pub bus: Arc<RealtimeEventBus>,
    pub auth: AuthConfig,
    pub health: HealthState,
}

/// Bind address of the gateway.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Build the gateway router.
///
/// - GET /health, GET /metrics (public)
/// - /v1/tenants/{tenant}/... and /v1/sessions/stats (bearer auth)
/// - GET /v1/tenants/{tenant}/events WebSocket (bearer header or `token` query)
pub fn router(state: GatewayState) -> Router {
    let auth_state = state.auth.clone();

    let public_routes = Router::new()
        .route("/health", get(handlers::get_health))
        .route("/metrics", get(handlers::get_metrics))
        .with_state(state.clone());

    let api_routes = Router::new()
        .route("/v1/tenants/{tenant}/connect", post(handlers::post_connect))
        .route(
            "/v1/tenants/{tenant}/disconnect",
            post(handlers::post_disconnect),
        )
        .route("/v1/tenants/{tenant}/status", get(handlers::get_status))
        .route(
            "/v1/tenants/{tenant}/qr",
            get(handlers::get_qr).post(handlers::post_qr),
        )
        .route(
            "/v1/tenants/{tenant}/messages",
            get(handlers::get_messages).post(handlers::post_message),
        )
        .route(
            "/v1/tenants/{tenant}/bot-rules",
            post(handlers::post_bot_rule),
        )
        .route(
            "/v1/tenants/{tenant}/products",
            get(handlers::get_products).post(handlers::post_product),
        )
        .route("/v1/tenants/{tenant}/contacts", post(handlers::post_contact))
        .route("/v1/tenants/{tenant}/events", get(ws::ws_handler))
        .route("/v1/sessions/stats", get(handlers::get_session_stats))
        .route_layer(axum_middleware::from_fn_with_state(
            auth_state,
            auth_middleware,
        ))
        .with_state(state);

    Router::new()
        .merge(public_routes)
        .merge(api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// Serve the gateway until `shutdown` is cancelled.
pub async fn start_server(
    config: &ServerConfig,
    state: GatewayState,
    shutdown: CancellationToken,
) -> Result<(), GatehouseError> {
    if state.auth.bearer_token.is_none() {
        tracing::warn!("gateway.bearer_token is not set; API routes will reject every request");
    }
    let app = router(state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| GatehouseError::Internal(format!("failed to bind gateway to {addr}: {e}")))?;

    tracing::info!("Gateway server listening on {addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .map_err(|e| GatehouseError::Internal(format!("gateway server error: {e}")))?;

    tracing::info!("gateway server stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_config_debug() {
        let config = ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 3100,
        };
        let debug = format!("{config:?}");
        assert!(debug.contains("127.0.0.1"));
        assert!(debug.contains("3100"));
    }
}
