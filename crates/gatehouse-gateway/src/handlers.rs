// SPDX-FileCopyrightText: 2026 Gatehouse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Tenant and operator route handlers.

use std::time::Instant;

use axum::{
    Json,
    extract::{Path, Query, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use gatehouse_core::types::{BotRule, Contact, Message, Product, normalize_address};
use gatehouse_core::{SessionStatus, TenantId};
use gatehouse_session::SessionStats;
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::server::GatewayState;

type ApiResult<T> = Result<Json<T>, ApiError>;

fn tenant_id(raw: String) -> Result<TenantId, ApiError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ApiError::BadRequest("tenant id must not be empty".into()));
    }
    Ok(TenantId::new(trimmed))
}

fn require(field: &str, value: &str) -> Result<(), ApiError> {
    if value.trim().is_empty() {
        return Err(ApiError::BadRequest(format!("{field} must not be empty")));
    }
    Ok(())
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub uptime_secs: u64,
    pub live_sessions: usize,
}

/// GET /health
pub async fn get_health(State(state): State<GatewayState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        uptime_secs: state.health.start_time.elapsed().as_secs(),
        live_sessions: state.controller.registry().len(),
    })
}

/// GET /metrics
pub async fn get_metrics(State(state): State<GatewayState>) -> Response {
    match &state.health.prometheus_render {
        Some(render) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
            render(),
        )
            .into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

/// POST /v1/tenants/{tenant}/connect
pub async fn post_connect(
    State(state): State<GatewayState>,
    Path(tenant): Path<String>,
) -> ApiResult<SessionStatus> {
    let tenant = tenant_id(tenant)?;
    Ok(Json(state.controller.connect(&tenant).await?))
}

/// POST /v1/tenants/{tenant}/disconnect
pub async fn post_disconnect(
    State(state): State<GatewayState>,
    Path(tenant): Path<String>,
) -> ApiResult<SessionStatus> {
    let tenant = tenant_id(tenant)?;
    Ok(Json(state.controller.disconnect(&tenant).await?))
}

/// GET /v1/tenants/{tenant}/status
pub async fn get_status(
    State(state): State<GatewayState>,
    Path(tenant): Path<String>,
) -> ApiResult<SessionStatus> {
    let tenant = tenant_id(tenant)?;
    Ok(Json(state.controller.get_status(&tenant).await?))
}

#[derive(Debug, Serialize)]
pub struct QrResponse {
    pub qr: String,
}

/// GET /v1/tenants/{tenant}/qr
///
/// Waits a bounded time for the current or next QR payload.
pub async fn get_qr(
    State(state): State<GatewayState>,
    Path(tenant): Path<String>,
) -> ApiResult<QrResponse> {
    let tenant = tenant_id(tenant)?;
    let qr = state.controller.wait_for_qr(&tenant).await?;
    Ok(Json(QrResponse { qr }))
}

/// POST /v1/tenants/{tenant}/qr
///
/// Discards the stored pairing and starts a fresh QR handshake.
pub async fn post_qr(
    State(state): State<GatewayState>,
    Path(tenant): Path<String>,
) -> ApiResult<SessionStatus> {
    let tenant = tenant_id(tenant)?;
    Ok(Json(state.controller.force_new_qr(&tenant).await?))
}

#[derive(Debug, Deserialize)]
pub struct SendRequest {
    pub chat_id: String,
    pub text: String,
}

#[derive(Debug, Serialize)]
pub struct SendResponse {
    pub message_id: String,
}

/// POST /v1/tenants/{tenant}/messages
pub async fn post_message(
    State(state): State<GatewayState>,
    Path(tenant): Path<String>,
    Json(body): Json<SendRequest>,
) -> ApiResult<SendResponse> {
    let tenant = tenant_id(tenant)?;
    require("chat_id", &body.chat_id)?;
    require("text", &body.text)?;
    let started = Instant::now();
    let message_id = state
        .controller
        .send_text(&tenant, &body.chat_id, &body.text)
        .await?;
    tracing::debug!(
        tenant = %tenant,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "message sent"
    );
    Ok(Json(SendResponse { message_id }))
}

#[derive(Debug, Deserialize)]
pub struct MessagesQuery {
    pub chat_id: String,
    /// Alternate address of the same peer (for example a phone-number form).
    pub alt_chat_id: Option<String>,
    #[serde(default = "default_page")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

fn default_page() -> i64 {
    50
}

/// GET /v1/tenants/{tenant}/messages
pub async fn get_messages(
    State(state): State<GatewayState>,
    Path(tenant): Path<String>,
    Query(query): Query<MessagesQuery>,
) -> ApiResult<Vec<Message>> {
    let tenant = tenant_id(tenant)?;
    require("chat_id", &query.chat_id)?;
    let alt = query.alt_chat_id.as_deref().unwrap_or(&query.chat_id);
    let messages = state
        .controller
        .ingest()
        .recent_messages(&tenant, &query.chat_id, alt, query.limit, query.offset)
        .await?;
    Ok(Json(messages))
}

#[derive(Debug, Deserialize)]
pub struct NewBotRule {
    pub trigger_keyword: String,
    pub response_text: String,
    #[serde(default)]
    pub priority: i64,
}

/// POST /v1/tenants/{tenant}/bot-rules
pub async fn post_bot_rule(
    State(state): State<GatewayState>,
    Path(tenant): Path<String>,
    Json(body): Json<NewBotRule>,
) -> Result<(StatusCode, Json<BotRule>), ApiError> {
    let tenant = tenant_id(tenant)?;
    require("trigger_keyword", &body.trigger_keyword)?;
    require("response_text", &body.response_text)?;
    let id = state
        .storage
        .insert_bot_rule(&tenant, &body.trigger_keyword, &body.response_text, body.priority)
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(BotRule {
            id,
            tenant_id: tenant.to_string(),
            trigger_keyword: body.trigger_keyword,
            response_text: body.response_text,
            priority: body.priority,
            active: true,
        }),
    ))
}

/// GET /v1/tenants/{tenant}/products
pub async fn get_products(
    State(state): State<GatewayState>,
    Path(tenant): Path<String>,
) -> ApiResult<Vec<Product>> {
    let tenant = tenant_id(tenant)?;
    Ok(Json(state.storage.list_products(&tenant).await?))
}

#[derive(Debug, Deserialize)]
pub struct NewProduct {
    pub name: String,
    /// Price in minor currency units.
    pub price: i64,
    #[serde(default)]
    pub stock: i64,
}

/// POST /v1/tenants/{tenant}/products
pub async fn post_product(
    State(state): State<GatewayState>,
    Path(tenant): Path<String>,
    Json(body): Json<NewProduct>,
) -> Result<(StatusCode, Json<Product>), ApiError> {
    let tenant = tenant_id(tenant)?;
    require("name", &body.name)?;
    if body.price < 0 || body.stock < 0 {
        return Err(ApiError::BadRequest(
            "price and stock must not be negative".into(),
        ));
    }
    let product = state
        .storage
        .insert_product(&tenant, body.name.trim(), body.price, body.stock)
        .await?;
    Ok((StatusCode::CREATED, Json(product)))
}

#[derive(Debug, Deserialize)]
pub struct NewContact {
    pub name: String,
    pub address: String,
}

/// POST /v1/tenants/{tenant}/contacts
///
/// The address may be given in any form the transport uses; it is stored
/// normalized so inbound messages resolve to the contact.
pub async fn post_contact(
    State(state): State<GatewayState>,
    Path(tenant): Path<String>,
    Json(body): Json<NewContact>,
) -> ApiResult<Contact> {
    let tenant = tenant_id(tenant)?;
    let address = normalize_address(&body.address);
    require("address", &address)?;
    Ok(Json(
        state
            .storage
            .upsert_contact(&tenant, body.name.trim(), &address)
            .await?,
    ))
}

/// GET /v1/sessions/stats
pub async fn get_session_stats(State(state): State<GatewayState>) -> ApiResult<SessionStats> {
    Ok(Json(state.reconciler.stats().await?))
}
