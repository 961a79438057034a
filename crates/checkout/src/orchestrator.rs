//! The checkout workflow.

use common::{CustomerId, OrderId};
use domain::{Money, Order, OrderLine, OrderStatus};
use payments::PaymentGateway;
use store::{CheckoutTx, StatusTransition, Store};

use crate::{CheckoutError, Result};

/// What a successful checkout hands back to the client.
#[derive(Debug, Clone)]
pub struct CheckoutOutcome {
    pub order: Order,
    /// Client-usable secret to complete payment with the processor.
    pub client_secret: String,
}

/// Orchestrates the atomic checkout transaction and the post-commit
/// authorization request.
pub struct CheckoutService<S, G> {
    store: S,
    gateway: G,
    currency: String,
}

impl<S, G> CheckoutService<S, G>
where
    S: Store,
    G: PaymentGateway,
{
    /// Creates a new checkout service charging in `currency`.
    pub fn new(store: S, gateway: G, currency: impl Into<String>) -> Self {
        Self {
            store,
            gateway,
            currency: currency.into(),
        }
    }

    /// Converts the customer's cart into a durable pending order and
    /// requests a payment authorization for its total.
    ///
    /// Order creation, stock decrements, line snapshots and the cart clear
    /// commit atomically; any validation failure rolls the whole unit back.
    /// The authorization request runs after the commit because the gateway
    /// cannot join the local transaction; if it fails, the pending order
    /// survives without a reference and can catch up via
    /// [`retry_authorization`](Self::retry_authorization).
    #[tracing::instrument(skip(self), fields(customer_id = %customer_id))]
    pub async fn checkout(&self, customer_id: CustomerId) -> Result<CheckoutOutcome> {
        metrics::counter!("checkouts_total").increment(1);

        let mut tx = self.store.begin_checkout().await?;

        if !tx.customer_exists(customer_id).await? {
            return Err(CheckoutError::NotFound {
                entity: "customer",
                id: customer_id.to_string(),
            });
        }

        let cart = tx.cart_lines(customer_id).await?;
        if cart.is_empty() {
            return Err(CheckoutError::EmptyCart);
        }

        // Validate every line before mutating anything, so a failure on the
        // third line never leaves the first two reserved.
        for line in &cart {
            let product = tx.product(line.product_id).await?.ok_or_else(|| {
                CheckoutError::NotFound {
                    entity: "product",
                    id: line.product_id.to_string(),
                }
            })?;
            if product.stock < line.quantity {
                return Err(CheckoutError::InsufficientStock {
                    product_id: line.product_id,
                    requested: line.quantity,
                    available: product.stock,
                });
            }
        }

        let mut order = Order::pending(customer_id);
        tx.insert_order(&order).await?;

        let mut total = Money::zero();
        for line in &cart {
            // The reserve re-reads live stock under the transaction's
            // isolation; a concurrent checkout that got there first is
            // visible here and can still fail this one.
            let unit_price = tx.reserve_stock(line.product_id, line.quantity).await?;
            let order_line =
                OrderLine::price(order.id, line.product_id, line.quantity, unit_price)
                    .map_err(store::StoreError::from)?;
            total += order_line.subtotal;
            tx.insert_order_line(&order_line).await?;
        }

        tx.set_order_total(order.id, total).await?;
        tx.clear_cart(customer_id).await?;
        tx.commit().await?;
        order.total = total;

        tracing::info!(order_id = %order.id, total = %total, "checkout committed");

        // Outside the atomic boundary from here on: a failure leaves the
        // committed pending order in place, to be retried.
        self.authorize(&mut order).await
    }

    /// Re-requests a payment authorization for a pending order that was left
    /// without a reference by a gateway failure after commit.
    #[tracing::instrument(skip(self), fields(order_id = %order_id))]
    pub async fn retry_authorization(&self, order_id: OrderId) -> Result<CheckoutOutcome> {
        let order = self.require_order(order_id).await?;

        if order.status != OrderStatus::Pending {
            return Err(CheckoutError::InvalidState(format!(
                "order {order_id} is {}, only pending orders can be authorized",
                order.status
            )));
        }
        if order.payment_reference.is_some() {
            return Err(CheckoutError::InvalidState(format!(
                "order {order_id} already has a payment authorization"
            )));
        }

        let mut order = order;
        self.authorize(&mut order).await
    }

    /// Refunds a paid order: calls the gateway, then records the refund
    /// reference and timestamp on the `paid -> refunded` edge.
    #[tracing::instrument(skip(self), fields(order_id = %order_id))]
    pub async fn refund(&self, order_id: OrderId) -> Result<Order> {
        let order = self.require_order(order_id).await?;

        if order.status != OrderStatus::Paid {
            return Err(CheckoutError::InvalidState(format!(
                "only paid orders can be refunded, order {order_id} is {}",
                order.status
            )));
        }
        let reference = order.payment_reference.as_deref().ok_or_else(|| {
            CheckoutError::InvalidState(format!("order {order_id} has no payment reference"))
        })?;

        let receipt = self.gateway.refund(reference).await?;
        self.store
            .record_refund(order_id, &receipt.refund_reference)
            .await?;

        tracing::info!(refund_reference = %receipt.refund_reference, "order refunded");
        self.require_order(order_id).await
    }

    /// Applies an administrative status transition, subject to the same
    /// transition table the reconciliation handler uses.
    ///
    /// Refunds are excluded: they move money and must go through
    /// [`refund`](Self::refund).
    #[tracing::instrument(skip(self), fields(order_id = %order_id))]
    pub async fn set_status(&self, order_id: OrderId, to: OrderStatus) -> Result<Order> {
        if to == OrderStatus::Refunded {
            return Err(CheckoutError::InvalidState(
                "refunds must go through the refund operation".to_string(),
            ));
        }

        let allowed_from: Vec<OrderStatus> = [
            OrderStatus::Pending,
            OrderStatus::Paid,
            OrderStatus::Failed,
            OrderStatus::Cancelled,
            OrderStatus::Refunded,
        ]
        .into_iter()
        .filter(|from| from.can_transition_to(to))
        .collect();

        if allowed_from.is_empty() {
            return Err(CheckoutError::InvalidState(format!(
                "no status permits a transition to {to}"
            )));
        }

        match self
            .store
            .transition_status(order_id, &allowed_from, to)
            .await?
        {
            StatusTransition::Applied => self.require_order(order_id).await,
            StatusTransition::Skipped { current } => Err(CheckoutError::InvalidState(format!(
                "invalid status transition: {current} -> {to}"
            ))),
        }
    }

    /// Loads an order or fails with `NotFound`.
    pub async fn require_order(&self, order_id: OrderId) -> Result<Order> {
        self.store
            .order(order_id)
            .await?
            .ok_or(CheckoutError::NotFound {
                entity: "order",
                id: order_id.to_string(),
            })
    }

    /// Returns the backing store.
    pub fn store(&self) -> &S {
        &self.store
    }

    async fn authorize(&self, order: &mut Order) -> Result<CheckoutOutcome> {
        let authorization = match self
            .gateway
            .create_authorization(order.total, &self.currency)
            .await
        {
            Ok(authorization) => authorization,
            Err(err) => {
                metrics::counter!("authorizations_failed_total").increment(1);
                tracing::warn!(
                    order_id = %order.id,
                    error = %err,
                    "authorization request failed after commit; order stays pending without a reference"
                );
                return Err(err.into());
            }
        };

        self.store
            .set_payment_reference(order.id, &authorization.reference)
            .await?;
        order.payment_reference = Some(authorization.reference);

        Ok(CheckoutOutcome {
            order: order.clone(),
            client_secret: authorization.client_secret,
        })
    }
}
