//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use checkout::CheckoutError;

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Bad request from the client.
    BadRequest(String),
    /// Checkout or reconciliation error.
    Checkout(CheckoutError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Checkout(err) => checkout_error_to_response(err),
        };

        let body = serde_json::json!({ "error": message });
        (status, axum::Json(body)).into_response()
    }
}

fn checkout_error_to_response(err: CheckoutError) -> (StatusCode, String) {
    match &err {
        CheckoutError::NotFound { .. } => (StatusCode::NOT_FOUND, err.to_string()),
        CheckoutError::EmptyCart => (StatusCode::BAD_REQUEST, err.to_string()),
        CheckoutError::InvalidState(_)
        | CheckoutError::InsufficientStock { .. }
        | CheckoutError::Conflict(_) => (StatusCode::CONFLICT, err.to_string()),
        CheckoutError::Unauthenticated(_) => (StatusCode::BAD_REQUEST, err.to_string()),
        CheckoutError::ExternalService(_) => (StatusCode::BAD_GATEWAY, err.to_string()),
        CheckoutError::Store(inner) => {
            tracing::error!(error = %inner, "store failure surfaced to API");
            (StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
        }
    }
}

impl From<CheckoutError> for ApiError {
    fn from(err: CheckoutError) -> Self {
        ApiError::Checkout(err)
    }
}

impl From<store::StoreError> for ApiError {
    fn from(err: store::StoreError) -> Self {
        ApiError::Checkout(CheckoutError::from(err))
    }
}
