//! Store error types.

use thiserror::Error;

/// Errors surfaced by the persistence layer.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A referenced record does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// Stock reservation would take a product below zero.
    #[error("insufficient stock for product {product_id}: requested {requested}, available {available}")]
    InsufficientStock {
        product_id: common::ProductId,
        requested: u32,
        available: u32,
    },

    /// A uniqueness guarantee was violated, e.g. a duplicate payment reference.
    #[error("conflict: {0}")]
    Conflict(String),

    /// The record exists but is not in a state that permits the operation.
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// A persisted row that cannot be mapped back into a domain value.
    #[error("corrupt row: {0}")]
    Corrupt(String),

    /// Domain-level validation failure while materializing records.
    #[error(transparent)]
    Domain(#[from] domain::DomainError),

    /// Underlying database failure.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Migration failure at startup.
    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

impl StoreError {
    pub(crate) fn not_found(entity: &'static str, id: impl ToString) -> Self {
        StoreError::NotFound {
            entity,
            id: id.to_string(),
        }
    }
}

/// Convenience alias for store results.
pub type Result<T> = std::result::Result<T, StoreError>;
