//! Payment gateway boundary.
//!
//! The engine never talks to the processor directly; everything flows through
//! the [`PaymentGateway`] trait. [`StripeGateway`] is the production client,
//! [`InMemoryGateway`] the deterministic test double. Webhook authenticity is
//! checked with the processor's timestamped HMAC scheme over the exact
//! request bytes.

mod error;
mod gateway;
mod memory;
mod signature;
mod stripe;

pub use error::{GatewayError, Result};
pub use gateway::{Authorization, NotificationKind, PaymentGateway, PaymentNotification, RefundReceipt};
pub use memory::InMemoryGateway;
pub use signature::WebhookVerifier;
pub use stripe::{StripeConfig, StripeGateway};
