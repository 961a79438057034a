//! Checkout orchestration and payment reconciliation.
//!
//! [`CheckoutService`] turns a customer's cart into a durable pending order
//! inside one store unit of work, then requests a payment authorization from
//! the gateway outside it. [`ReconciliationHandler`] consumes the processor's
//! asynchronous notifications (possibly delayed, duplicated or out of order)
//! and advances the order status idempotently.

mod error;
mod orchestrator;
mod reconcile;

pub use error::{CheckoutError, Result};
pub use orchestrator::{CheckoutOutcome, CheckoutService};
pub use reconcile::{Ack, ReconciliationHandler};
