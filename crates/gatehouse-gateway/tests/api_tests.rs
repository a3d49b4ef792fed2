// SPDX-FileCopyrightText: 2026 Gatehouse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP routes against the full session stack and the mock transport.

use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use gatehouse_core::{AuthCredentials, ConnectionState, StorageAdapter, TenantId, TransportEvent};
use gatehouse_gateway::{AuthConfig, GatewayState, HealthState, router};
use gatehouse_test_utils::TestHarness;
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;

const TOKEN: &str = "test-token";

fn app(h: &TestHarness, bearer_token: Option<&str>) -> Router {
    let storage: Arc<dyn StorageAdapter> = h.storage.clone();
    router(GatewayState {
        controller: h.controller.clone(),
        reconciler: h.reconciler.clone(),
        storage,
        bus: h.bus.clone(),
        auth: AuthConfig {
            bearer_token: bearer_token.map(str::to_string),
        },
        health: HealthState {
            start_time: Instant::now(),
            prometheus_render: None,
        },
    })
}

async fn call(
    app: &Router,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {token}"));
    }
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

async fn open_session(h: &TestHarness, app: &Router, tenant: &TenantId) {
    let uri = format!("/v1/tenants/{tenant}/connect");
    let (status, _) = call(app, "POST", &uri, Some(TOKEN), None).await;
    assert_eq!(status, StatusCode::OK);
    let transport = h.transport.latest(tenant).unwrap();
    transport
        .emit(TransportEvent::CredentialsUpdated(AuthCredentials(b"creds".to_vec())))
        .await;
    transport.emit(TransportEvent::Opened).await;
    h.wait_for_state(tenant, ConnectionState::Open).await;
}

#[tokio::test]
async fn health_is_public() {
    let h = TestHarness::new().await.unwrap();
    let app = app(&h, Some(TOKEN));
    let (status, body) = call(&app, "GET", "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["live_sessions"], 0);
}

#[tokio::test]
async fn metrics_without_recorder_is_not_found() {
    let h = TestHarness::new().await.unwrap();
    let app = app(&h, Some(TOKEN));
    let (status, _) = call(&app, "GET", "/metrics", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn api_routes_require_matching_token() {
    let h = TestHarness::new().await.unwrap();
    let app = app(&h, Some(TOKEN));
    let uri = "/v1/tenants/acme/status";

    let (status, _) = call(&app, "GET", uri, None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = call(&app, "GET", uri, Some("wrong"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = call(&app, "GET", "/v1/tenants/acme/events", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = call(&app, "GET", uri, Some(TOKEN), None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn api_rejects_everything_without_configured_token() {
    let h = TestHarness::new().await.unwrap();
    let app = app(&h, None);
    let (status, _) = call(&app, "GET", "/v1/tenants/acme/status", Some(TOKEN), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = call(&app, "GET", "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn never_connected_status_reads_close() {
    let h = TestHarness::new().await.unwrap();
    let app = app(&h, Some(TOKEN));
    let (status, body) = call(&app, "GET", "/v1/tenants/nobody/status", Some(TOKEN), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["connected"], false);
    assert_eq!(body["state"], "close");
}

#[tokio::test]
async fn connect_then_wait_for_qr() {
    let h = TestHarness::new().await.unwrap();
    let app = app(&h, Some(TOKEN));
    let t = TenantId::new("acme");

    let (status, body) = call(&app, "POST", "/v1/tenants/acme/connect", Some(TOKEN), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["state"], "connecting");

    h.transport
        .latest(&t)
        .unwrap()
        .emit(TransportEvent::Qr("qr-abc".into()))
        .await;
    let (status, body) = call(&app, "GET", "/v1/tenants/acme/qr", Some(TOKEN), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["qr"], "qr-abc");
}

#[tokio::test]
async fn qr_wait_without_session_conflicts() {
    let h = TestHarness::new().await.unwrap();
    let app = app(&h, Some(TOKEN));
    let (status, body) = call(&app, "GET", "/v1/tenants/acme/qr", Some(TOKEN), None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["error"].as_str().unwrap().contains("not connected"));
}

#[tokio::test]
async fn qr_wait_on_open_session_conflicts() {
    let h = TestHarness::new().await.unwrap();
    let app = app(&h, Some(TOKEN));
    open_session(&h, &app, &TenantId::new("acme")).await;
    let (status, body) = call(&app, "GET", "/v1/tenants/acme/qr", Some(TOKEN), None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["error"].as_str().unwrap().contains("already connected"));
}

#[tokio::test]
async fn qr_wait_times_out_when_none_arrives() {
    let h = TestHarness::new().await.unwrap();
    let app = app(&h, Some(TOKEN));
    call(&app, "POST", "/v1/tenants/acme/connect", Some(TOKEN), None).await;
    let (status, _) = call(&app, "GET", "/v1/tenants/acme/qr", Some(TOKEN), None).await;
    assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
}

#[tokio::test]
async fn send_requires_open_session() {
    let h = TestHarness::new().await.unwrap();
    let app = app(&h, Some(TOKEN));
    let (status, _) = call(
        &app,
        "POST",
        "/v1/tenants/acme/messages",
        Some(TOKEN),
        Some(json!({"chat_id": "628123@s.whatsapp.net", "text": "hi"})),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn send_validates_body() {
    let h = TestHarness::new().await.unwrap();
    let app = app(&h, Some(TOKEN));
    let (status, body) = call(
        &app,
        "POST",
        "/v1/tenants/acme/messages",
        Some(TOKEN),
        Some(json!({"chat_id": " ", "text": "hi"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("chat_id"));
}

#[tokio::test]
async fn sent_message_is_listed() {
    let h = TestHarness::new().await.unwrap();
    let app = app(&h, Some(TOKEN));
    let t = TenantId::new("acme");
    open_session(&h, &app, &t).await;

    let chat = "628123@s.whatsapp.net";
    let (status, body) = call(
        &app,
        "POST",
        "/v1/tenants/acme/messages",
        Some(TOKEN),
        Some(json!({"chat_id": chat, "text": "your order shipped"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let message_id = body["message_id"].as_str().unwrap().to_string();
    assert_eq!(h.transport.latest(&t).unwrap().sent().len(), 1);

    let uri = format!("/v1/tenants/acme/messages?chat_id={chat}&limit=10");
    let (status, body) = call(&app, "GET", &uri, Some(TOKEN), None).await;
    assert_eq!(status, StatusCode::OK);
    let messages = body.as_array().unwrap();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0]["message_id"], message_id.as_str());
    assert_eq!(messages[0]["is_outgoing"], true);
    assert_eq!(messages[0]["content"], "your order shipped");
}

#[tokio::test]
async fn send_failure_after_retries_is_bad_gateway() {
    let h = TestHarness::new().await.unwrap();
    let app = app(&h, Some(TOKEN));
    let t = TenantId::new("acme");
    open_session(&h, &app, &t).await;
    h.transport.latest(&t).unwrap().fail_next_sends(10);

    let (status, body) = call(
        &app,
        "POST",
        "/v1/tenants/acme/messages",
        Some(TOKEN),
        Some(json!({"chat_id": "628123@s.whatsapp.net", "text": "hi"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert!(body["error"].as_str().unwrap().contains("2 attempts"));
}

#[tokio::test]
async fn disconnect_resets_status() {
    let h = TestHarness::new().await.unwrap();
    let app = app(&h, Some(TOKEN));
    let t = TenantId::new("acme");
    open_session(&h, &app, &t).await;

    let (status, body) = call(&app, "POST", "/v1/tenants/acme/disconnect", Some(TOKEN), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["connected"], false);
    assert!(h.transport.latest(&t).unwrap().logged_out());

    let (_, body) = call(&app, "GET", "/v1/tenants/acme/status", Some(TOKEN), None).await;
    assert_eq!(body["connected"], false);
    assert_eq!(body["state"], "close");
}

#[tokio::test]
async fn catalog_and_contacts_feed_the_bot() {
    let h = TestHarness::new().await.unwrap();
    let app = app(&h, Some(TOKEN));
    let t = TenantId::new("acme");

    let (status, product) = call(
        &app,
        "POST",
        "/v1/tenants/acme/products",
        Some(TOKEN),
        Some(json!({"name": "Gaming Laptop", "price": 1500000, "stock": 3})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(product["stock"], 3);

    let (status, _) = call(
        &app,
        "POST",
        "/v1/tenants/acme/products",
        Some(TOKEN),
        Some(json!({"name": "Mouse", "price": -1})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, products) = call(&app, "GET", "/v1/tenants/acme/products", Some(TOKEN), None).await;
    assert_eq!(products.as_array().unwrap().len(), 1);

    let (status, rule) = call(
        &app,
        "POST",
        "/v1/tenants/acme/bot-rules",
        Some(TOKEN),
        Some(json!({"trigger_keyword": "hours", "response_text": "9 to 5", "priority": 2})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(rule["trigger_keyword"], "hours");

    let (status, contact) = call(
        &app,
        "POST",
        "/v1/tenants/acme/contacts",
        Some(TOKEN),
        Some(json!({"name": "Budi", "address": "628123:7@s.whatsapp.net"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(contact["address"], "628123");

    let found = h
        .storage
        .find_contact_by_address(&t, "628123")
        .await
        .unwrap();
    assert_eq!(found.unwrap().name, "Budi");
}

#[tokio::test]
async fn stats_count_live_and_persisted_sessions() {
    let h = TestHarness::new().await.unwrap();
    let app = app(&h, Some(TOKEN));
    open_session(&h, &app, &TenantId::new("acme")).await;

    let (status, body) = call(&app, "GET", "/v1/sessions/stats", Some(TOKEN), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total_sessions"], 1);
    assert_eq!(body["connected"], 1);
    assert_eq!(body["live_in_memory"], 1);
    assert_eq!(body["stale_detected"], 0);
}
