//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use order_store::StoreError;
use placement::PlacementError;

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Resource not found.
    NotFound(String),
    /// Bad request from the client.
    BadRequest(String),
    /// Placement did not produce an order.
    Placement(PlacementError),
    /// Order store error.
    Store(StoreError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Placement(err) => return placement_error_to_response(err),
            ApiError::Store(err) => store_error_to_response(err),
        };

        let body = serde_json::json!({ "error": message });
        (status, axum::Json(body)).into_response()
    }
}

fn placement_error_to_response(err: PlacementError) -> Response {
    let (status, message) = match &err {
        PlacementError::DependencyUnavailable { message } => {
            // The fallback is an answer, not an error
            let body = serde_json::json!({ "message": message });
            return (StatusCode::OK, axum::Json(body)).into_response();
        }
        PlacementError::Validation(_) | PlacementError::OutOfStock { .. } => {
            (StatusCode::BAD_REQUEST, err.to_string())
        }
        PlacementError::Overloaded => (StatusCode::SERVICE_UNAVAILABLE, err.to_string()),
        PlacementError::Persistence(_) | PlacementError::WorkerFailed(_) => {
            tracing::error!(error = %err, "order placement failed");
            (StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
        }
    };

    let body = serde_json::json!({ "error": message });
    (status, axum::Json(body)).into_response()
}

fn store_error_to_response(err: StoreError) -> (StatusCode, String) {
    match &err {
        StoreError::OrderNotFound(_) => (StatusCode::NOT_FOUND, err.to_string()),
        StoreError::DuplicateOrderNumber(_) => (StatusCode::CONFLICT, err.to_string()),
        _ => {
            tracing::error!(error = %err, "order store failure");
            (StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
        }
    }
}

impl From<PlacementError> for ApiError {
    fn from(err: PlacementError) -> Self {
        ApiError::Placement(err)
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        ApiError::Store(err)
    }
}
