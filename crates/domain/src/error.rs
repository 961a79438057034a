//! Domain error types.

use thiserror::Error;

use crate::OrderStatus;

/// Errors raised by pure domain logic.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    /// The requested status edge is not in the transition table.
    #[error("invalid status transition: {from} -> {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },

    /// A line quantity outside the valid range.
    #[error("invalid quantity: {quantity}")]
    InvalidQuantity { quantity: u32 },

    /// A status string that does not name a known status.
    #[error("unknown order status: {0}")]
    UnknownStatus(String),
}
