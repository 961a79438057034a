//! Store contracts consumed by the checkout orchestrator and the
//! reconciliation handler.

use async_trait::async_trait;
use common::{CustomerId, OrderId, ProductId};
use domain::{CartLine, Customer, Money, Order, OrderLine, OrderStatus, Product};

use crate::Result;

/// Outcome of a conditional status update.
///
/// Reconciliation relies on `Skipped` being a successful no-op: a duplicate
/// or out-of-order notification must not clobber a settled order, and must
/// not be an error either.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusTransition {
    /// The order matched one of the expected source statuses and was moved.
    Applied,
    /// The order exists but its current status did not match; nothing changed.
    Skipped { current: OrderStatus },
}

/// Unit of work scoped to a single checkout.
///
/// All mutations stage inside one atomic boundary; [`commit`](Self::commit)
/// makes them durable together, dropping the value rolls everything back.
/// Implementations must give two concurrent checkouts contending on the same
/// product a serialized view of its stock.
#[async_trait]
pub trait CheckoutTx: Send {
    /// Returns true if the customer exists.
    async fn customer_exists(&mut self, customer_id: CustomerId) -> Result<bool>;

    /// Loads the customer's cart lines.
    async fn cart_lines(&mut self, customer_id: CustomerId) -> Result<Vec<CartLine>>;

    /// Reads a product's live snapshot under the transaction's isolation.
    async fn product(&mut self, product_id: ProductId) -> Result<Option<Product>>;

    /// Inserts a new order row.
    async fn insert_order(&mut self, order: &Order) -> Result<()>;

    /// Atomically decrements a product's stock by `quantity` and returns the
    /// pre-reservation unit price for snapshotting.
    ///
    /// Fails with [`StoreError::InsufficientStock`](crate::StoreError) when
    /// the live stock is short, without mutating anything.
    async fn reserve_stock(&mut self, product_id: ProductId, quantity: u32) -> Result<Money>;

    /// Inserts an immutable order line.
    async fn insert_order_line(&mut self, line: &OrderLine) -> Result<()>;

    /// Sets the order's total once all lines are priced.
    async fn set_order_total(&mut self, order_id: OrderId, total: Money) -> Result<()>;

    /// Deletes every cart line belonging to the customer.
    async fn clear_cart(&mut self, customer_id: CustomerId) -> Result<()>;

    /// Commits the unit of work.
    async fn commit(self) -> Result<()>;
}

/// Backing store for orders, inventory and carts.
#[async_trait]
pub trait Store: Send + Sync {
    type Tx: CheckoutTx;

    /// Opens a checkout unit of work.
    async fn begin_checkout(&self) -> Result<Self::Tx>;

    /// Looks up a customer.
    async fn customer(&self, customer_id: CustomerId) -> Result<Option<Customer>>;

    /// Loads an order by id.
    async fn order(&self, order_id: OrderId) -> Result<Option<Order>>;

    /// Loads the immutable lines of an order.
    async fn order_lines(&self, order_id: OrderId) -> Result<Vec<OrderLine>>;

    /// Looks up the order holding the given processor payment reference.
    async fn order_by_payment_reference(&self, reference: &str) -> Result<Option<Order>>;

    /// Assigns the processor payment reference to an order.
    ///
    /// The reference is write-once and unique: a second assignment fails with
    /// `InvalidState`, a reference already claimed by another order with
    /// `Conflict`.
    async fn set_payment_reference(&self, order_id: OrderId, reference: &str) -> Result<()>;

    /// Moves an order to `to` only if its current status is one of
    /// `allowed_from`. The conditional write is the idempotency guard for
    /// duplicate and out-of-order notifications.
    async fn transition_status(
        &self,
        order_id: OrderId,
        allowed_from: &[OrderStatus],
        to: OrderStatus,
    ) -> Result<StatusTransition>;

    /// Marks a paid order refunded, recording the refund reference and
    /// timestamp. Fails with `InvalidState` unless the order is `paid`.
    async fn record_refund(&self, order_id: OrderId, refund_reference: &str) -> Result<()>;

    // -- Seeding/admin surface (cart and catalog management proper live
    //    outside this engine) --

    /// Inserts a customer.
    async fn insert_customer(&self, customer: &Customer) -> Result<()>;

    /// Inserts or replaces a product.
    async fn upsert_product(&self, product: &Product) -> Result<()>;

    /// Reads a product outside any checkout transaction.
    async fn product(&self, product_id: ProductId) -> Result<Option<Product>>;

    /// Adds a line to a customer's cart, replacing any line for the same
    /// product.
    async fn add_cart_line(&self, line: &CartLine) -> Result<()>;

    /// Reads a customer's cart.
    async fn cart_lines(&self, customer_id: CustomerId) -> Result<Vec<CartLine>>;
}
