//! Shared identifier types used across the checkout engine.

mod types;

pub use types::{CustomerId, OrderId, OrderLineId, ProductId};
