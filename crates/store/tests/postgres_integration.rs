//! PostgreSQL integration tests
//!
//! These tests use a shared PostgreSQL container for efficiency.
//! Run with:
//!
//! ```bash
//! cargo test -p store --test postgres_integration -- --test-threads=1
//! ```

use std::sync::Arc;

use common::{CustomerId, ProductId};
use domain::{CartLine, Customer, Money, Order, OrderLine, OrderStatus, Product};
use sqlx::PgPool;
use store::{CheckoutTx, PostgresStore, StatusTransition, Store, StoreError};
use testcontainers::{ContainerAsync, runners::AsyncRunner};
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;

/// Shared container info - container stays alive for all tests
struct ContainerInfo {
    #[allow(dead_code)] // Container must stay alive for tests
    container: ContainerAsync<Postgres>,
    connection_string: String,
}

/// Global shared container
static CONTAINER: OnceCell<Arc<ContainerInfo>> = OnceCell::const_new();

async fn get_container_info() -> Arc<ContainerInfo> {
    CONTAINER
        .get_or_init(|| async {
            let container = Postgres::default().start().await.unwrap();

            let host = container.get_host().await.unwrap();
            let port = container.get_host_port_ipv4(5432).await.unwrap();

            let connection_string =
                format!("postgres://postgres:postgres@{}:{}/postgres", host, port);

            // Create a temporary pool just for migrations
            let temp_pool = PgPool::connect(&connection_string).await.unwrap();

            sqlx::raw_sql(include_str!(
                "../../../migrations/001_create_checkout_tables.sql"
            ))
            .execute(&temp_pool)
            .await
            .unwrap();

            temp_pool.close().await;

            Arc::new(ContainerInfo {
                container,
                connection_string,
            })
        })
        .await
        .clone()
}

/// Get a fresh store with its own pool and cleared tables
async fn get_test_store() -> PostgresStore {
    let info = get_container_info().await;

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(&info.connection_string)
        .await
        .unwrap();

    sqlx::query("TRUNCATE TABLE order_lines, orders, cart_lines, products, customers")
        .execute(&pool)
        .await
        .unwrap();

    PostgresStore::new(pool)
}

async fn seed(store: &PostgresStore, stock: u32, price_cents: i64) -> (CustomerId, ProductId) {
    let customer = Customer {
        id: CustomerId::new(),
        email: "buyer@example.com".to_string(),
    };
    let product = Product {
        id: ProductId::new(),
        name: "Widget".to_string(),
        unit_price: Money::from_cents(price_cents),
        stock,
    };
    store.insert_customer(&customer).await.unwrap();
    store.upsert_product(&product).await.unwrap();
    (customer.id, product.id)
}

#[tokio::test]
async fn checkout_tx_commits_all_effects_together() {
    let store = get_test_store().await;
    let (customer_id, product_id) = seed(&store, 5, 1000).await;

    store
        .add_cart_line(&CartLine {
            customer_id,
            product_id,
            quantity: 2,
        })
        .await
        .unwrap();

    let order = Order::pending(customer_id);
    let mut tx = store.begin_checkout().await.unwrap();
    assert!(tx.customer_exists(customer_id).await.unwrap());

    let lines = tx.cart_lines(customer_id).await.unwrap();
    assert_eq!(lines.len(), 1);

    tx.insert_order(&order).await.unwrap();
    let unit_price = tx.reserve_stock(product_id, 2).await.unwrap();
    assert_eq!(unit_price, Money::from_cents(1000));

    let line = OrderLine::price(order.id, product_id, 2, unit_price).unwrap();
    tx.insert_order_line(&line).await.unwrap();
    tx.set_order_total(order.id, line.subtotal).await.unwrap();
    tx.clear_cart(customer_id).await.unwrap();
    tx.commit().await.unwrap();

    let stored = store.order(order.id).await.unwrap().unwrap();
    assert_eq!(stored.status, OrderStatus::Pending);
    assert_eq!(stored.total, Money::from_cents(2000));

    let stored_lines = store.order_lines(order.id).await.unwrap();
    assert_eq!(stored_lines.len(), 1);
    assert_eq!(stored_lines[0].subtotal, Money::from_cents(2000));

    assert_eq!(store.product(product_id).await.unwrap().unwrap().stock, 3);
    assert!(store.cart_lines(customer_id).await.unwrap().is_empty());
}

#[tokio::test]
async fn dropped_tx_rolls_back_everything() {
    let store = get_test_store().await;
    let (customer_id, product_id) = seed(&store, 5, 1000).await;

    {
        let mut tx = store.begin_checkout().await.unwrap();
        tx.insert_order(&Order::pending(customer_id)).await.unwrap();
        tx.reserve_stock(product_id, 4).await.unwrap();
        // dropped without commit
    }

    assert_eq!(store.product(product_id).await.unwrap().unwrap().stock, 5);
}

#[tokio::test]
async fn reserve_stock_rejects_shortfall_and_missing_product() {
    let store = get_test_store().await;
    let (_, product_id) = seed(&store, 1, 500).await;

    let mut tx = store.begin_checkout().await.unwrap();
    let err = tx.reserve_stock(product_id, 2).await.unwrap_err();
    assert!(matches!(
        err,
        StoreError::InsufficientStock {
            requested: 2,
            available: 1,
            ..
        }
    ));

    let err = tx.reserve_stock(ProductId::new(), 1).await.unwrap_err();
    assert!(matches!(err, StoreError::NotFound { .. }));
    drop(tx);

    assert_eq!(store.product(product_id).await.unwrap().unwrap().stock, 1);
}

#[tokio::test]
async fn payment_reference_unique_constraint_maps_to_conflict() {
    let store = get_test_store().await;
    let (customer_id, _) = seed(&store, 1, 500).await;

    let first = Order::pending(customer_id);
    let second = Order::pending(customer_id);
    let mut tx = store.begin_checkout().await.unwrap();
    tx.insert_order(&first).await.unwrap();
    tx.insert_order(&second).await.unwrap();
    tx.commit().await.unwrap();

    store
        .set_payment_reference(first.id, "pi_test_1")
        .await
        .unwrap();

    let err = store
        .set_payment_reference(second.id, "pi_test_1")
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::Conflict(_)));

    let err = store
        .set_payment_reference(first.id, "pi_test_2")
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::InvalidState(_)));

    let found = store
        .order_by_payment_reference("pi_test_1")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found.id, first.id);
}

#[tokio::test]
async fn conditional_status_update_is_idempotent() {
    let store = get_test_store().await;
    let (customer_id, _) = seed(&store, 1, 500).await;

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

    // A late "failed" event must not clobber the settled status.
    let late = store
        .transition_status(order.id, &[OrderStatus::Pending], OrderStatus::Failed)
        .await
        .unwrap();
    assert_eq!(
        late,
        StatusTransition::Skipped {
            current: OrderStatus::Paid
        }
    );
}

#[tokio::test]
async fn refund_records_reference_and_timestamp() {
    let store = get_test_store().await;
    let (customer_id, _) = seed(&store, 1, 500).await;

    let order = Order::pending(customer_id);
    let mut tx = store.begin_checkout().await.unwrap();
    tx.insert_order(&order).await.unwrap();
    tx.commit().await.unwrap();

    assert!(matches!(
        store.record_refund(order.id, "re_test").await,
        Err(StoreError::InvalidState(_))
    ));

    store
        .transition_status(order.id, &[OrderStatus::Pending], OrderStatus::Paid)
        .await
        .unwrap();
    store.record_refund(order.id, "re_test").await.unwrap();

    let refunded = store.order(order.id).await.unwrap().unwrap();
    assert_eq!(refunded.status, OrderStatus::Refunded);
    assert_eq!(refunded.refund_reference.as_deref(), Some("re_test"));
    assert!(refunded.refunded_at.is_some());
}
