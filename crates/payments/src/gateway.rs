//! Gateway trait and the typed notification model.

use async_trait::async_trait;
use domain::Money;
use serde::{Deserialize, Serialize};

use crate::Result;

/// A granted payment authorization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Authorization {
    /// Processor-side reference for the authorization. Reconciliation keys
    /// order lookups on this.
    pub reference: String,
    /// Client-usable secret the customer needs to complete payment.
    pub client_secret: String,
}

/// A processed refund.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefundReceipt {
    /// Processor-side refund reference.
    pub refund_reference: String,
}

/// What an asynchronous processor notification says happened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum NotificationKind {
    /// The customer's payment authorization went through.
    AuthorizationSucceeded,
    /// The authorization failed.
    AuthorizationFailed,
    /// The authorization was cancelled before completing.
    AuthorizationCancelled,
    /// An event type this engine does not act on. Acknowledged and ignored.
    Unrecognized(String),
}

impl NotificationKind {
    /// Maps a processor event type string onto the typed kind.
    pub fn from_event_type(event_type: &str) -> Self {
        match event_type {
            "payment_intent.succeeded" => NotificationKind::AuthorizationSucceeded,
            "payment_intent.payment_failed" => NotificationKind::AuthorizationFailed,
            "payment_intent.canceled" => NotificationKind::AuthorizationCancelled,
            other => NotificationKind::Unrecognized(other.to_string()),
        }
    }
}

/// A verified, parsed processor notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentNotification {
    pub kind: NotificationKind,
    /// The authorization reference the event refers to.
    pub payment_reference: String,
}

/// Boundary to the external payment processor.
///
/// Implementations hold only immutable configuration (credentials, timeouts)
/// and are injected as a capability rather than reached through globals.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Requests a payment authorization for the given amount.
    async fn create_authorization(&self, amount: Money, currency: &str) -> Result<Authorization>;

    /// Refunds a previously confirmed authorization.
    async fn refund(&self, reference: &str) -> Result<RefundReceipt>;

    /// Verifies a notification's authenticity against the exact request
    /// bytes and parses it. Fails closed with
    /// [`GatewayError::Unauthenticated`](crate::GatewayError) on any
    /// signature mismatch.
    fn verify_notification(
        &self,
        raw_body: &[u8],
        signature_header: &str,
    ) -> Result<PaymentNotification>;
}
