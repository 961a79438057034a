//! Checkout error taxonomy.

use common::ProductId;
use payments::GatewayError;
use store::StoreError;
use thiserror::Error;

/// Errors surfaced to callers of the checkout and reconciliation flows.
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// A referenced customer, product or order does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// Checkout was attempted against an empty cart.
    #[error("cart is empty")]
    EmptyCart,

    /// The target record is not in a state that permits the operation.
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// A cart line asked for more units than the product has.
    #[error("insufficient stock for product {product_id}: requested {requested}, available {available}")]
    InsufficientStock {
        product_id: ProductId,
        requested: u32,
        available: u32,
    },

    /// A uniqueness guarantee was violated.
    #[error("conflict: {0}")]
    Conflict(String),

    /// A notification failed signature verification.
    #[error("unauthenticated notification: {0}")]
    Unauthenticated(String),

    /// The payment gateway was unreachable or rejected the request. The
    /// local transaction, if any, is already committed and stays committed.
    #[error("payment gateway error: {0}")]
    ExternalService(String),

    /// Residual store failure (database errors, corrupt rows).
    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for CheckoutError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { entity, id } => CheckoutError::NotFound { entity, id },
            StoreError::InsufficientStock {
                product_id,
                requested,
                available,
            } => CheckoutError::InsufficientStock {
                product_id,
                requested,
                available,
            },
            StoreError::Conflict(msg) => CheckoutError::Conflict(msg),
            StoreError::InvalidState(msg) => CheckoutError::InvalidState(msg),
            other => CheckoutError::Store(other),
        }
    }
}

impl From<GatewayError> for CheckoutError {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::Unauthenticated(msg) => CheckoutError::Unauthenticated(msg),
            other => CheckoutError::ExternalService(other.to_string()),
        }
    }
}

/// Convenience alias for checkout results.
pub type Result<T> = std::result::Result<T, CheckoutError>;
