// SPDX-FileCopyrightText: 2026 Gatehouse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use gatehouse_core::GatehouseError;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Error returned by API handlers.
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Gatehouse(GatehouseError),
}

impl From<GatehouseError> for ApiError {
    fn from(e: GatehouseError) -> Self {
        Self::Gatehouse(e)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Gatehouse(e) => match e {
                GatehouseError::NotConnected { .. }
                | GatehouseError::AlreadyConnected { .. } => StatusCode::CONFLICT,
                GatehouseError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
                GatehouseError::ConnectionInit { .. }
                | GatehouseError::SendFailure { .. }
                | GatehouseError::Transport { .. } => StatusCode::BAD_GATEWAY,
                GatehouseError::Config(_) => StatusCode::BAD_REQUEST,
                GatehouseError::Storage { .. } | GatehouseError::Internal(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let error = match self {
            Self::BadRequest(message) => message,
            Self::Gatehouse(e) => {
                if status.is_server_error() {
                    tracing::warn!(error = %e, "request failed");
                }
                e.to_string()
            }
        };
        (status, Json(ErrorResponse { error })).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn errors_map_to_status_codes() {
        let cases = [
            (
                ApiError::from(GatehouseError::NotConnected { tenant: "t".into() }),
                StatusCode::CONFLICT,
            ),
            (
                ApiError::from(GatehouseError::AlreadyConnected { tenant: "t".into() }),
                StatusCode::CONFLICT,
            ),
            (
                ApiError::from(GatehouseError::Timeout {
                    duration: Duration::from_secs(1),
                }),
                StatusCode::GATEWAY_TIMEOUT,
            ),
            (
                ApiError::from(GatehouseError::SendFailure {
                    tenant: "t".into(),
                    chat_id: "c".into(),
                    attempts: 3,
                    message: "x".into(),
                }),
                StatusCode::BAD_GATEWAY,
            ),
            (ApiError::BadRequest("no".into()), StatusCode::BAD_REQUEST),
            (
                ApiError::from(GatehouseError::Internal("boom".into())),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(err.status(), status);
        }
    }
}
