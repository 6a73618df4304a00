//! HTTP API handlers for rv-api

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tracing::error;

pub mod health;
pub mod reports;

/// Maps domain errors onto HTTP responses
#[derive(Debug)]
pub struct ApiError(rv_common::Error);

impl From<rv_common::Error> for ApiError {
    fn from(e: rv_common::Error) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        use rv_common::Error::*;
        let status = match &self.0 {
            InvalidCoordinates { .. } | InvalidInput(_) => StatusCode::BAD_REQUEST,
            NotFound(_) => StatusCode::NOT_FOUND,
            Database(_) | Io(_) | Config(_) | Internal(_) => {
                error!("Request failed: {}", self.0);
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        let body = Json(json!({ "error": self.0.to_string() }));
        (status, body).into_response()
    }
}
