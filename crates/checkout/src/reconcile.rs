//! Reconciliation of asynchronous processor notifications.

use domain::OrderStatus;
use payments::{NotificationKind, PaymentGateway};
use store::{StatusTransition, Store};

use crate::Result;

/// Disposition of a handled notification.
///
/// Every variant is a successful acknowledgment: the sender retries on
/// anything else, so only signature failures surface as errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Ack {
    /// The order moved to its new status.
    Applied {
        reference: String,
        status: OrderStatus,
    },
    /// The order was already past `pending`; duplicate or late delivery.
    AlreadySettled {
        reference: String,
        current: OrderStatus,
    },
    /// No order holds this reference. It may belong to another system, or
    /// the reference may not have been persisted yet.
    NoMatchingOrder { reference: String },
    /// An event kind this engine does not act on.
    Ignored { event_type: String },
}

/// Drives the order status state machine from verified notifications.
pub struct ReconciliationHandler<S, G> {
    store: S,
    gateway: G,
}

impl<S, G> ReconciliationHandler<S, G>
where
    S: Store,
    G: PaymentGateway,
{
    /// Creates a new handler.
    pub fn new(store: S, gateway: G) -> Self {
        Self { store, gateway }
    }

    /// Verifies and applies one notification delivery.
    ///
    /// The status write is conditional on the order still being `pending`,
    /// so re-applying the same event, or applying a stale event after the
    /// order settled, is a no-op rather than an error.
    #[tracing::instrument(skip_all)]
    pub async fn handle(&self, raw_body: &[u8], signature_header: &str) -> Result<Ack> {
        metrics::counter!("notifications_total").increment(1);

        // Fails closed: nothing below runs for an unauthenticated delivery.
        let notification = self
            .gateway
            .verify_notification(raw_body, signature_header)?;

        let target = match &notification.kind {
            NotificationKind::AuthorizationSucceeded => OrderStatus::Paid,
            NotificationKind::AuthorizationFailed
            | NotificationKind::AuthorizationCancelled => OrderStatus::Failed,
            NotificationKind::Unrecognized(event_type) => {
                tracing::debug!(event_type, "ignoring unrecognized notification");
                return Ok(Ack::Ignored {
                    event_type: event_type.clone(),
                });
            }
        };

        let reference = notification.payment_reference;
        let order = match self.store.order_by_payment_reference(&reference).await? {
            Some(order) => order,
            None => {
                tracing::info!(%reference, "no order for notification reference");
                return Ok(Ack::NoMatchingOrder { reference });
            }
        };

        match self
            .store
            .transition_status(order.id, &[OrderStatus::Pending], target)
            .await?
        {
            StatusTransition::Applied => {
                metrics::counter!("notifications_applied_total").increment(1);
                tracing::info!(order_id = %order.id, status = %target, "order status reconciled");
                if target == OrderStatus::Failed {
                    // Stock reserved at checkout is not returned here; a
                    // restock decision is an operator action.
                    tracing::warn!(order_id = %order.id, "authorization failed; inventory stays reserved");
                }
                Ok(Ack::Applied {
                    reference,
                    status: target,
                })
            }
            StatusTransition::Skipped { current } => {
                tracing::debug!(
                    order_id = %order.id,
                    %current,
                    target = %target,
                    "notification did not match a valid edge; acknowledged as no-op"
                );
                Ok(Ack::AlreadySettled { reference, current })
            }
        }
    }
}
