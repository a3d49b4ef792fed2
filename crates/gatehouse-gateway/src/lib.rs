// SPDX-FileCopyrightText: 2026 Gatehouse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP/WebSocket API over the session controller.
//!
//! Tenant routes live under `/v1/tenants/{tenant}` and require a bearer
//! token. `/health` and `/metrics` are public. Realtime events for a tenant
//! stream over `/v1/tenants/{tenant}/events`.

pub mod auth;
pub mod error;
pub mod handlers;
pub mod server;
pub mod ws;

pub use auth::AuthConfig;
pub use error::ApiError;
pub use server::{GatewayState, HealthState, ServerConfig, router, start_server};
