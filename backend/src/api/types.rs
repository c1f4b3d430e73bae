//! REST API response types.
//!
//! Successful responses serialize domain types directly (`ImportResult`,
//! `Contact`, `Product`); every error body has the shape `{"message": "..."}`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::{ServerError, StoreError};

/// `GET /health` payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
    pub endpoints: Vec<String>,
}

impl HealthResponse {
    pub fn ok(endpoints: Vec<String>) -> Self {
        Self {
            status: "ok".to_string(),
            service: env!("CARGO_PKG_NAME").to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            endpoints,
        }
    }
}

pub fn error_response(message: &str) -> Value {
    json!({ "message": message })
}

impl ServerError {
    pub fn status(&self) -> StatusCode {
        match self {
            ServerError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ServerError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            ServerError::NotFound(_) => StatusCode::NOT_FOUND,
            ServerError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Store failure on a read endpoint.
    pub fn retrieval(err: StoreError) -> Self {
        ServerError::Internal(format!("Error retrieving records: {}", err))
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        if let ServerError::Internal(ref message) = self {
            tracing::error!(%message, "request failed");
        }
        (self.status(), Json(error_response(&self.to_string()))).into_response()
    }
}
