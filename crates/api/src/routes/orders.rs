//! Order lookup and administrative order operations.

use std::str::FromStr;
use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use common::OrderId;
use domain::{Order, OrderLine, OrderStatus};
use payments::PaymentGateway;
use serde::{Deserialize, Serialize};
use store::Store;

use crate::error::ApiError;
use crate::routes::AppState;

// -- Request types --

#[derive(Deserialize)]
pub struct SetStatusRequest {
    pub status: String,
}

// -- Response types --

#[derive(Serialize)]
pub struct OrderResponse {
    pub id: String,
    pub customer_id: String,
    pub status: String,
    pub total_cents: i64,
    pub payment_reference: Option<String>,
    pub refund_reference: Option<String>,
    pub refunded_at: Option<String>,
    pub created_at: String,
}

impl OrderResponse {
    pub fn from_order(order: &Order) -> Self {
        Self {
            id: order.id.to_string(),
            customer_id: order.customer_id.to_string(),
            status: order.status.to_string(),
            total_cents: order.total.cents(),
            payment_reference: order.payment_reference.clone(),
            refund_reference: order.refund_reference.clone(),
            refunded_at: order.refunded_at.map(|t| t.to_rfc3339()),
            created_at: order.created_at.to_rfc3339(),
        }
    }
}

#[derive(Serialize)]
pub struct OrderLineResponse {
    pub product_id: String,
    pub quantity: u32,
    pub unit_price_cents: i64,
    pub subtotal_cents: i64,
}

impl OrderLineResponse {
    fn from_line(line: &OrderLine) -> Self {
        Self {
            product_id: line.product_id.to_string(),
            quantity: line.quantity,
            unit_price_cents: line.unit_price.cents(),
            subtotal_cents: line.subtotal.cents(),
        }
    }
}

// -- Handlers --

/// GET /orders/:id — load an order by ID.
#[tracing::instrument(skip(state))]
pub async fn get<S, G>(
    State(state): State<Arc<AppState<S, G>>>,
    Path(id): Path<String>,
) -> Result<Json<OrderResponse>, ApiError>
where
    S: Store + 'static,
    G: PaymentGateway + 'static,
{
    let order_id = parse_order_id(&id)?;
    let order = state.service.require_order(order_id).await?;
    Ok(Json(OrderResponse::from_order(&order)))
}

/// GET /orders/:id/lines — list the priced lines of an order.
#[tracing::instrument(skip(state))]
pub async fn lines<S, G>(
    State(state): State<Arc<AppState<S, G>>>,
    Path(id): Path<String>,
) -> Result<Json<Vec<OrderLineResponse>>, ApiError>
where
    S: Store + 'static,
    G: PaymentGateway + 'static,
{
    let order_id = parse_order_id(&id)?;
    // 404 for a missing order rather than an empty list.
    state.service.require_order(order_id).await?;
    let lines = state.store.order_lines(order_id).await?;
    Ok(Json(lines.iter().map(OrderLineResponse::from_line).collect()))
}

/// PUT /orders/:id/status — apply an administrative status transition.
#[tracing::instrument(skip(state, req))]
pub async fn set_status<S, G>(
    State(state): State<Arc<AppState<S, G>>>,
    Path(id): Path<String>,
    Json(req): Json<SetStatusRequest>,
) -> Result<Json<OrderResponse>, ApiError>
where
    S: Store + 'static,
    G: PaymentGateway + 'static,
{
    let order_id = parse_order_id(&id)?;
    let to = OrderStatus::from_str(&req.status)
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;
    let order = state.service.set_status(order_id, to).await?;
    Ok(Json(OrderResponse::from_order(&order)))
}

/// POST /orders/:id/refund — refund a paid order through the processor.
#[tracing::instrument(skip(state))]
pub async fn refund<S, G>(
    State(state): State<Arc<AppState<S, G>>>,
    Path(id): Path<String>,
) -> Result<Json<OrderResponse>, ApiError>
where
    S: Store + 'static,
    G: PaymentGateway + 'static,
{
    let order_id = parse_order_id(&id)?;
    let order = state.service.refund(order_id).await?;
    Ok(Json(OrderResponse::from_order(&order)))
}

#[derive(Serialize)]
pub struct AuthorizeResponse {
    pub order: OrderResponse,
    pub client_secret: String,
}

/// POST /orders/:id/authorize — retry authorization for an orphaned
/// pending order.
#[tracing::instrument(skip(state))]
pub async fn authorize<S, G>(
    State(state): State<Arc<AppState<S, G>>>,
    Path(id): Path<String>,
) -> Result<Json<AuthorizeResponse>, ApiError>
where
    S: Store + 'static,
    G: PaymentGateway + 'static,
{
    let order_id = parse_order_id(&id)?;
    let outcome = state.service.retry_authorization(order_id).await?;
    Ok(Json(AuthorizeResponse {
        order: OrderResponse::from_order(&outcome.order),
        client_secret: outcome.client_secret,
    }))
}

pub(crate) fn parse_order_id(id: &str) -> Result<OrderId, ApiError> {
    let uuid = uuid::Uuid::parse_str(id)
        .map_err(|e| ApiError::BadRequest(format!("invalid order id: {e}")))?;
    Ok(OrderId::from_uuid(uuid))
}
