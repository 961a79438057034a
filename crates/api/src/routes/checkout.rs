//! Checkout endpoint.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use common::CustomerId;
use payments::PaymentGateway;
use serde::{Deserialize, Serialize};
use store::Store;

use crate::error::ApiError;
use crate::routes::AppState;
use crate::routes::orders::OrderResponse;

#[derive(Deserialize)]
pub struct CheckoutRequest {
    pub customer_id: String,
}

#[derive(Serialize)]
pub struct CheckoutResponse {
    pub order: OrderResponse,
    pub client_secret: String,
}

/// POST /checkout — convert the customer's cart into a pending order and
/// request a payment authorization.
#[tracing::instrument(skip(state, req))]
pub async fn checkout<S, G>(
    State(state): State<Arc<AppState<S, G>>>,
    Json(req): Json<CheckoutRequest>,
) -> Result<(StatusCode, Json<CheckoutResponse>), ApiError>
where
    S: Store + 'static,
    G: PaymentGateway + 'static,
{
    let uuid = uuid::Uuid::parse_str(&req.customer_id)
        .map_err(|e| ApiError::BadRequest(format!("invalid customer_id: {e}")))?;
    let customer_id = CustomerId::from_uuid(uuid);

    let outcome = state.service.checkout(customer_id).await?;

    Ok((
        StatusCode::CREATED,
        Json(CheckoutResponse {
            order: OrderResponse::from_order(&outcome.order),
            client_secret: outcome.client_secret,
        }),
    ))
}
