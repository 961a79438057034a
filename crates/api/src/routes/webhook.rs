//! Payment processor webhook endpoint.

use std::sync::Arc;

use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use payments::PaymentGateway;
use serde::Serialize;
use store::Store;

use crate::error::ApiError;
use crate::routes::AppState;

#[derive(Serialize)]
pub struct WebhookResponse {
    pub received: bool,
}

/// POST /payment/webhook — verify and apply one notification delivery.
///
/// Verification runs over the raw request bytes; the body is never
/// re-serialized before signing material is checked. Every verified
/// delivery is acknowledged with 200, including duplicates, late
/// arrivals and references no order holds. Only a signature failure
/// rejects the delivery.
#[tracing::instrument(skip_all)]
pub async fn receive<S, G>(
    State(state): State<Arc<AppState<S, G>>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookResponse>, ApiError>
where
    S: Store + 'static,
    G: PaymentGateway + 'static,
{
    let signature = headers
        .get("stripe-signature")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::BadRequest("missing stripe-signature header".to_string()))?;

    let ack = state.handler.handle(&body, signature).await?;
    tracing::debug!(?ack, "notification acknowledged");

    Ok(Json(WebhookResponse { received: true }))
}
