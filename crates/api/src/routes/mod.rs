//! Route handlers and shared application state.

pub mod checkout;
pub mod health;
pub mod metrics;
pub mod orders;
pub mod webhook;

use ::checkout::{CheckoutService, ReconciliationHandler};
use payments::PaymentGateway;
use store::Store;

/// Shared application state accessible from all handlers.
pub struct AppState<S: Store, G: PaymentGateway> {
    pub service: CheckoutService<S, G>,
    pub handler: ReconciliationHandler<S, G>,
    pub store: S,
}
