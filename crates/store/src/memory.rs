//! In-memory store implementation for testing.
//!
//! Mirrors the PostgreSQL semantics: a checkout unit of work stages its
//! mutations on a copy of the state and publishes them on commit, and the
//! single mutex serializes contending checkouts the way row locks do.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use common::{CustomerId, OrderId, ProductId};
use domain::{CartLine, Customer, Money, Order, OrderLine, OrderStatus, Product};
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::store::{CheckoutTx, StatusTransition, Store};
use crate::{Result, StoreError};

#[derive(Clone, Default)]
struct State {
    customers: HashMap<CustomerId, Customer>,
    products: HashMap<ProductId, Product>,
    cart: Vec<CartLine>,
    orders: HashMap<OrderId, Order>,
    order_lines: Vec<OrderLine>,
}

/// In-memory store with the same interface as [`PostgresStore`](crate::PostgresStore).
#[derive(Clone, Default)]
pub struct InMemoryStore {
    state: Arc<Mutex<State>>,
}

impl InMemoryStore {
    /// Creates a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of persisted orders.
    pub async fn order_count(&self) -> usize {
        self.state.lock().await.orders.len()
    }

    /// Returns every persisted order, for test assertions.
    pub async fn orders(&self) -> Vec<Order> {
        self.state.lock().await.orders.values().cloned().collect()
    }
}

/// A staged checkout over a copy of the store state.
///
/// The owned mutex guard is held for the lifetime of the transaction, so a
/// second checkout observes the first's committed effects before it reads
/// any stock.
pub struct InMemoryCheckoutTx {
    guard: OwnedMutexGuard<State>,
    staged: State,
}

#[async_trait]
impl CheckoutTx for InMemoryCheckoutTx {
    async fn customer_exists(&mut self, customer_id: CustomerId) -> Result<bool> {
        Ok(self.staged.customers.contains_key(&customer_id))
    }

    async fn cart_lines(&mut self, customer_id: CustomerId) -> Result<Vec<CartLine>> {
        Ok(self
            .staged
            .cart
            .iter()
            .filter(|line| line.customer_id == customer_id)
            .cloned()
            .collect())
    }

    async fn product(&mut self, product_id: ProductId) -> Result<Option<Product>> {
        Ok(self.staged.products.get(&product_id).cloned())
    }

    async fn insert_order(&mut self, order: &Order) -> Result<()> {
        self.staged.orders.insert(order.id, order.clone());
        Ok(())
    }

    async fn reserve_stock(&mut self, product_id: ProductId, quantity: u32) -> Result<Money> {
        let product = self
            .staged
            .products
            .get_mut(&product_id)
            .ok_or_else(|| StoreError::not_found("product", product_id))?;

        if product.stock < quantity {
            return Err(StoreError::InsufficientStock {
                product_id,
                requested: quantity,
                available: product.stock,
            });
        }

        product.stock -= quantity;
        Ok(product.unit_price)
    }

    async fn insert_order_line(&mut self, line: &OrderLine) -> Result<()> {
        self.staged.order_lines.push(line.clone());
        Ok(())
    }

    async fn set_order_total(&mut self, order_id: OrderId, total: Money) -> Result<()> {
        let order = self
            .staged
            .orders
            .get_mut(&order_id)
            .ok_or_else(|| StoreError::not_found("order", order_id))?;
        order.total = total;
        order.updated_at = Utc::now();
        Ok(())
    }

    async fn clear_cart(&mut self, customer_id: CustomerId) -> Result<()> {
        self.staged.cart.retain(|line| line.customer_id != customer_id);
        Ok(())
    }

    async fn commit(mut self) -> Result<()> {
        *self.guard = self.staged;
        Ok(())
    }
}

#[async_trait]
impl Store for InMemoryStore {
    type Tx = InMemoryCheckoutTx;

    async fn begin_checkout(&self) -> Result<Self::Tx> {
        let guard = Arc::clone(&self.state).lock_owned().await;
        let staged = guard.clone();
        Ok(InMemoryCheckoutTx { guard, staged })
    }

    async fn customer(&self, customer_id: CustomerId) -> Result<Option<Customer>> {
        Ok(self.state.lock().await.customers.get(&customer_id).cloned())
    }

    async fn order(&self, order_id: OrderId) -> Result<Option<Order>> {
        Ok(self.state.lock().await.orders.get(&order_id).cloned())
    }

    async fn order_lines(&self, order_id: OrderId) -> Result<Vec<OrderLine>> {
        Ok(self
            .state
            .lock()
            .await
            .order_lines
            .iter()
            .filter(|line| line.order_id == order_id)
            .cloned()
            .collect())
    }

    async fn order_by_payment_reference(&self, reference: &str) -> Result<Option<Order>> {
        Ok(self
            .state
            .lock()
            .await
            .orders
            .values()
            .find(|order| order.payment_reference.as_deref() == Some(reference))
            .cloned())
    }

    async fn set_payment_reference(&self, order_id: OrderId, reference: &str) -> Result<()> {
        let mut state = self.state.lock().await;

        let taken = state
            .orders
            .values()
            .any(|o| o.id != order_id && o.payment_reference.as_deref() == Some(reference));
        if taken {
            return Err(StoreError::Conflict(format!(
                "payment reference {reference} already belongs to another order"
            )));
        }

        let order = state
            .orders
            .get_mut(&order_id)
            .ok_or_else(|| StoreError::not_found("order", order_id))?;

        if order.payment_reference.is_some() {
            return Err(StoreError::InvalidState(format!(
                "order {order_id} already has a payment reference"
            )));
        }

        order.payment_reference = Some(reference.to_string());
        order.updated_at = Utc::now();
        Ok(())
    }

    async fn transition_status(
        &self,
        order_id: OrderId,
        allowed_from: &[OrderStatus],
        to: OrderStatus,
    ) -> Result<StatusTransition> {
        let mut state = self.state.lock().await;
        let order = state
            .orders
            .get_mut(&order_id)
            .ok_or_else(|| StoreError::not_found("order", order_id))?;

        if !allowed_from.contains(&order.status) {
            return Ok(StatusTransition::Skipped {
                current: order.status,
            });
        }

        order.status = to;
        order.updated_at = Utc::now();
        Ok(StatusTransition::Applied)
    }

    async fn record_refund(&self, order_id: OrderId, refund_reference: &str) -> Result<()> {
        let mut state = self.state.lock().await;
        let order = state
            .orders
            .get_mut(&order_id)
            .ok_or_else(|| StoreError::not_found("order", order_id))?;

        if order.status != OrderStatus::Paid {
            return Err(StoreError::InvalidState(format!(
                "only paid orders can be refunded, order {order_id} is {}",
                order.status
            )));
        }

        order.status = OrderStatus::Refunded;
        order.refund_reference = Some(refund_reference.to_string());
        order.refunded_at = Some(Utc::now());
        order.updated_at = Utc::now();
        Ok(())
    }

    async fn insert_customer(&self, customer: &Customer) -> Result<()> {
        self.state
            .lock()
            .await
            .customers
            .insert(customer.id, customer.clone());
        Ok(())
    }

    async fn upsert_product(&self, product: &Product) -> Result<()> {
        self.state
            .lock()
            .await
            .products
            .insert(product.id, product.clone());
        Ok(())
    }

    async fn product(&self, product_id: ProductId) -> Result<Option<Product>> {
        Ok(self.state.lock().await.products.get(&product_id).cloned())
    }

    async fn add_cart_line(&self, line: &CartLine) -> Result<()> {
        let mut state = self.state.lock().await;
        state.cart.retain(|existing| {
            !(existing.customer_id == line.customer_id && existing.product_id == line.product_id)
        });
        state.cart.push(line.clone());
        Ok(())
    }

    async fn cart_lines(&self, customer_id: CustomerId) -> Result<Vec<CartLine>> {
        Ok(self
            .state
            .lock()
            .await
            .cart
            .iter()
            .filter(|line| line.customer_id == customer_id)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn seed(store: &InMemoryStore, stock: u32) -> (CustomerId, ProductId) {
        let customer = Customer {
            id: CustomerId::new(),
            email: "test@example.com".to_string(),
        };
        let product = Product {
            id: ProductId::new(),
            name: "Widget".to_string(),
            unit_price: Money::from_cents(1000),
            stock,
        };
        store.insert_customer(&customer).await.unwrap();
        store.upsert_product(&product).await.unwrap();
        (customer.id, product.id)
    }

    #[tokio::test]
    async fn uncommitted_tx_leaves_no_trace() {
        let store = InMemoryStore::new();
        let (customer_id, product_id) = seed(&store, 5).await;

        {
            let mut tx = store.begin_checkout().await.unwrap();
            tx.insert_order(&Order::pending(customer_id)).await.unwrap();
            tx.reserve_stock(product_id, 3).await.unwrap();
            // dropped without commit
        }

        assert_eq!(store.order_count().await, 0);
        assert_eq!(store.product(product_id).await.unwrap().unwrap().stock, 5);
    }

    #[tokio::test]
    async fn committed_tx_publishes_all_effects() {
        let store = InMemoryStore::new();
        let (customer_id, product_id) = seed(&store, 5).await;

        let order = Order::pending(customer_id);
        let mut tx = store.begin_checkout().await.unwrap();
        tx.insert_order(&order).await.unwrap();
        let price = tx.reserve_stock(product_id, 2).await.unwrap();
        assert_eq!(price, Money::from_cents(1000));
        tx.commit().await.unwrap();

        assert_eq!(store.order_count().await, 1);
        assert_eq!(store.product(product_id).await.unwrap().unwrap().stock, 3);
    }

    #[tokio::test]
    async fn contending_reservations_never_oversell() {
        let store = InMemoryStore::new();
        let (_, product_id) = seed(&store, 3).await;

        let (a, b) = tokio::join!(
            async {
                let mut tx = store.begin_checkout().await.unwrap();
                let result = tx.reserve_stock(product_id, 2).await;
                if result.is_ok() {
                    tx.commit().await.unwrap();
                }
                result
            },
            async {
                let mut tx = store.begin_checkout().await.unwrap();
                let result = tx.reserve_stock(product_id, 2).await;
                if result.is_ok() {
                    tx.commit().await.unwrap();
                }
                result
            }
        );

        // Combined demand (4) exceeds stock (3): exactly one wins.
        assert!(a.is_ok() != b.is_ok());
        let loser = if a.is_ok() { b } else { a };
        assert!(matches!(
            loser,
            Err(StoreError::InsufficientStock {
                requested: 2,
                available: 1,
                ..
            })
        ));
        assert_eq!(store.product(product_id).await.unwrap().unwrap().stock, 1);
    }

    #[tokio::test]
    async fn conditional_transition_is_idempotent() {
        let store = InMemoryStore::new();
        let (customer_id, _) = seed(&store, 1).await;
        let order = Order::pending(customer_id);
        let mut tx = store.begin_checkout().await.unwrap();
        tx.insert_order(&order).await.unwrap();
        tx.commit().await.unwrap();

        let first = store
            .transition_status(order.id, &[OrderStatus::Pending], OrderStatus::Paid)
            .await
            .unwrap();
        assert_eq!(first, StatusTransition::Applied);

        let second = store
            .transition_status(order.id, &[OrderStatus::Pending], OrderStatus::Paid)
            .await
            .unwrap();
        assert_eq!(
            second,
            StatusTransition::Skipped {
                current: OrderStatus::Paid
            }
        );
    }

    #[tokio::test]
    async fn payment_reference_is_write_once_and_unique() {
        let store = InMemoryStore::new();
        let (customer_id, _) = seed(&store, 1).await;
        let first = Order::pending(customer_id);
        let second = Order::pending(customer_id);
        let mut tx = store.begin_checkout().await.unwrap();
        tx.insert_order(&first).await.unwrap();
        tx.insert_order(&second).await.unwrap();
        tx.commit().await.unwrap();

        store.set_payment_reference(first.id, "pi_1").await.unwrap();

        assert!(matches!(
            store.set_payment_reference(first.id, "pi_2").await,
            Err(StoreError::InvalidState(_))
        ));
        assert!(matches!(
            store.set_payment_reference(second.id, "pi_1").await,
            Err(StoreError::Conflict(_))
        ));

        let found = store.order_by_payment_reference("pi_1").await.unwrap();
        assert_eq!(found.unwrap().id, first.id);
    }

    #[tokio::test]
    async fn refund_requires_paid_status() {
        let store = InMemoryStore::new();
        let (customer_id, _) = seed(&store, 1).await;
        let order = Order::pending(customer_id);
        let mut tx = store.begin_checkout().await.unwrap();
        tx.insert_order(&order).await.unwrap();
        tx.commit().await.unwrap();

        assert!(matches!(
            store.record_refund(order.id, "re_1").await,
            Err(StoreError::InvalidState(_))
        ));

        store
            .transition_status(order.id, &[OrderStatus::Pending], OrderStatus::Paid)
            .await
            .unwrap();
        store.record_refund(order.id, "re_1").await.unwrap();

        let refunded = store.order(order.id).await.unwrap().unwrap();
        assert_eq!(refunded.status, OrderStatus::Refunded);
        assert_eq!(refunded.refund_reference.as_deref(), Some("re_1"));
        assert!(refunded.refunded_at.is_some());
    }
}
