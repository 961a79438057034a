//! PostgreSQL-backed store implementation.

use async_trait::async_trait;
use common::{CustomerId, OrderId, OrderLineId, ProductId};
use domain::{CartLine, Customer, Money, Order, OrderLine, OrderStatus, Product};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Postgres, Row, Transaction};
use uuid::Uuid;

use crate::store::{CheckoutTx, StatusTransition, Store};
use crate::{Result, StoreError};

/// PostgreSQL store over a shared connection pool.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Creates a store over an existing pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }
}

fn to_u32(value: i64, what: &str) -> Result<u32> {
    u32::try_from(value).map_err(|_| StoreError::Corrupt(format!("{what} out of range: {value}")))
}

fn parse_status(raw: &str) -> Result<OrderStatus> {
    raw.parse()
        .map_err(|_| StoreError::Corrupt(format!("unknown status in orders table: {raw}")))
}

fn row_to_order(row: PgRow) -> Result<Order> {
    let status: String = row.try_get("status")?;
    Ok(Order {
        id: OrderId::from_uuid(row.try_get::<Uuid, _>("id")?),
        customer_id: CustomerId::from_uuid(row.try_get::<Uuid, _>("customer_id")?),
        total: Money::from_cents(row.try_get("total_cents")?),
        status: parse_status(&status)?,
        payment_reference: row.try_get("payment_reference")?,
        refund_reference: row.try_get("refund_reference")?,
        refunded_at: row.try_get("refunded_at")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn row_to_product(row: PgRow) -> Result<Product> {
    Ok(Product {
        id: ProductId::from_uuid(row.try_get::<Uuid, _>("id")?),
        name: row.try_get("name")?,
        unit_price: Money::from_cents(row.try_get("price_cents")?),
        stock: to_u32(row.try_get("stock")?, "stock")?,
    })
}

fn row_to_cart_line(row: PgRow) -> Result<CartLine> {
    Ok(CartLine {
        customer_id: CustomerId::from_uuid(row.try_get::<Uuid, _>("customer_id")?),
        product_id: ProductId::from_uuid(row.try_get::<Uuid, _>("product_id")?),
        quantity: to_u32(row.try_get("quantity")?, "quantity")?,
    })
}

fn row_to_order_line(row: PgRow) -> Result<OrderLine> {
    Ok(OrderLine {
        id: OrderLineId::from_uuid(row.try_get::<Uuid, _>("id")?),
        order_id: OrderId::from_uuid(row.try_get::<Uuid, _>("order_id")?),
        product_id: ProductId::from_uuid(row.try_get::<Uuid, _>("product_id")?),
        quantity: to_u32(row.try_get("quantity")?, "quantity")?,
        unit_price: Money::from_cents(row.try_get("unit_price_cents")?),
        subtotal: Money::from_cents(row.try_get("subtotal_cents")?),
    })
}

const ORDER_COLUMNS: &str = "id, customer_id, total_cents, status, payment_reference, \
                             refund_reference, refunded_at, created_at, updated_at";

/// A checkout unit of work backed by a database transaction.
pub struct PostgresCheckoutTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl CheckoutTx for PostgresCheckoutTx {
    async fn customer_exists(&mut self, customer_id: CustomerId) -> Result<bool> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM customers WHERE id = $1)")
            .bind(customer_id.as_uuid())
            .fetch_one(&mut *self.tx)
            .await?;
        Ok(exists)
    }

    async fn cart_lines(&mut self, customer_id: CustomerId) -> Result<Vec<CartLine>> {
        let rows = sqlx::query(
            "SELECT customer_id, product_id, quantity FROM cart_lines WHERE customer_id = $1",
        )
        .bind(customer_id.as_uuid())
        .fetch_all(&mut *self.tx)
        .await?;

        rows.into_iter().map(row_to_cart_line).collect()
    }

    async fn product(&mut self, product_id: ProductId) -> Result<Option<Product>> {
        let row = sqlx::query("SELECT id, name, price_cents, stock FROM products WHERE id = $1")
            .bind(product_id.as_uuid())
            .fetch_optional(&mut *self.tx)
            .await?;

        row.map(row_to_product).transpose()
    }

    async fn insert_order(&mut self, order: &Order) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO orders (id, customer_id, total_cents, status, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(order.id.as_uuid())
        .bind(order.customer_id.as_uuid())
        .bind(order.total.cents())
        .bind(order.status.as_str())
        .bind(order.created_at)
        .bind(order.updated_at)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn reserve_stock(&mut self, product_id: ProductId, quantity: u32) -> Result<Money> {
        // Single conditional decrement: two contending checkouts serialize on
        // the row, and the guard clause keeps stock non-negative.
        let price: Option<i64> = sqlx::query_scalar(
            r#"
            UPDATE products
            SET stock = stock - $2, updated_at = now()
            WHERE id = $1 AND stock >= $2
            RETURNING price_cents
            "#,
        )
        .bind(product_id.as_uuid())
        .bind(i64::from(quantity))
        .fetch_optional(&mut *self.tx)
        .await?;

        if let Some(price_cents) = price {
            return Ok(Money::from_cents(price_cents));
        }

        // Distinguish a missing product from a shortfall.
        let stock: Option<i64> = sqlx::query_scalar("SELECT stock FROM products WHERE id = $1")
            .bind(product_id.as_uuid())
            .fetch_optional(&mut *self.tx)
            .await?;

        match stock {
            Some(available) => Err(StoreError::InsufficientStock {
                product_id,
                requested: quantity,
                available: to_u32(available, "stock")?,
            }),
            None => Err(StoreError::not_found("product", product_id)),
        }
    }

    async fn insert_order_line(&mut self, line: &OrderLine) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO order_lines (id, order_id, product_id, quantity, unit_price_cents, subtotal_cents)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(line.id.as_uuid())
        .bind(line.order_id.as_uuid())
        .bind(line.product_id.as_uuid())
        .bind(i64::from(line.quantity))
        .bind(line.unit_price.cents())
        .bind(line.subtotal.cents())
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn set_order_total(&mut self, order_id: OrderId, total: Money) -> Result<()> {
        let result = sqlx::query("UPDATE orders SET total_cents = $2, updated_at = now() WHERE id = $1")
            .bind(order_id.as_uuid())
            .bind(total.cents())
            .execute(&mut *self.tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::not_found("order", order_id));
        }
        Ok(())
    }

    async fn clear_cart(&mut self, customer_id: CustomerId) -> Result<()> {
        sqlx::query("DELETE FROM cart_lines WHERE customer_id = $1")
            .bind(customer_id.as_uuid())
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn commit(self) -> Result<()> {
        self.tx.commit().await?;
        Ok(())
    }
}

#[async_trait]
impl Store for PostgresStore {
    type Tx = PostgresCheckoutTx;

    async fn begin_checkout(&self) -> Result<Self::Tx> {
        let tx = self.pool.begin().await?;
        Ok(PostgresCheckoutTx { tx })
    }

    async fn customer(&self, customer_id: CustomerId) -> Result<Option<Customer>> {
        let row = sqlx::query("SELECT id, email FROM customers WHERE id = $1")
            .bind(customer_id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;

        row.map(|row| {
            Ok(Customer {
                id: CustomerId::from_uuid(row.try_get::<Uuid, _>("id")?),
                email: row.try_get("email")?,
            })
        })
        .transpose()
    }

    async fn order(&self, order_id: OrderId) -> Result<Option<Order>> {
        let row = sqlx::query(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"))
            .bind(order_id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;

        row.map(row_to_order).transpose()
    }

    async fn order_lines(&self, order_id: OrderId) -> Result<Vec<OrderLine>> {
        let rows = sqlx::query(
            r#"
            SELECT id, order_id, product_id, quantity, unit_price_cents, subtotal_cents
            FROM order_lines
            WHERE order_id = $1
            "#,
        )
        .bind(order_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(row_to_order_line).collect()
    }

    async fn order_by_payment_reference(&self, reference: &str) -> Result<Option<Order>> {
        let row = sqlx::query(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE payment_reference = $1"
        ))
        .bind(reference)
        .fetch_optional(&self.pool)
        .await?;

        row.map(row_to_order).transpose()
    }

    async fn set_payment_reference(&self, order_id: OrderId, reference: &str) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE orders
            SET payment_reference = $2, updated_at = now()
            WHERE id = $1 AND payment_reference IS NULL
            "#,
        )
        .bind(order_id.as_uuid())
        .bind(reference)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.constraint() == Some("orders_payment_reference_key")
            {
                return StoreError::Conflict(format!(
                    "payment reference {reference} already belongs to another order"
                ));
            }
            StoreError::Database(e)
        })?;

        if result.rows_affected() == 1 {
            return Ok(());
        }

        match self.order(order_id).await? {
            Some(_) => Err(StoreError::InvalidState(format!(
                "order {order_id} already has a payment reference"
            ))),
            None => Err(StoreError::not_found("order", order_id)),
        }
    }

    async fn transition_status(
        &self,
        order_id: OrderId,
        allowed_from: &[OrderStatus],
        to: OrderStatus,
    ) -> Result<StatusTransition> {
        let allowed: Vec<&str> = allowed_from.iter().map(OrderStatus::as_str).collect();
        let result = sqlx::query(
            r#"
            UPDATE orders
            SET status = $2, updated_at = now()
            WHERE id = $1 AND status = ANY($3)
            "#,
        )
        .bind(order_id.as_uuid())
        .bind(to.as_str())
        .bind(&allowed)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 1 {
            return Ok(StatusTransition::Applied);
        }

        let current: Option<String> = sqlx::query_scalar("SELECT status FROM orders WHERE id = $1")
            .bind(order_id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;

        match current {
            Some(raw) => Ok(StatusTransition::Skipped {
                current: parse_status(&raw)?,
            }),
            None => Err(StoreError::not_found("order", order_id)),
        }
    }

    async fn record_refund(&self, order_id: OrderId, refund_reference: &str) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE orders
            SET status = 'refunded', refund_reference = $2, refunded_at = now(), updated_at = now()
            WHERE id = $1 AND status = 'paid'
            "#,
        )
        .bind(order_id.as_uuid())
        .bind(refund_reference)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 1 {
            return Ok(());
        }

        match self.order(order_id).await? {
            Some(order) => Err(StoreError::InvalidState(format!(
                "only paid orders can be refunded, order {order_id} is {}",
                order.status
            ))),
            None => Err(StoreError::not_found("order", order_id)),
        }
    }

    async fn insert_customer(&self, customer: &Customer) -> Result<()> {
        sqlx::query("INSERT INTO customers (id, email) VALUES ($1, $2)")
            .bind(customer.id.as_uuid())
            .bind(&customer.email)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn upsert_product(&self, product: &Product) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO products (id, name, price_cents, stock)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (id) DO UPDATE
            SET name = EXCLUDED.name,
                price_cents = EXCLUDED.price_cents,
                stock = EXCLUDED.stock,
                updated_at = now()
            "#,
        )
        .bind(product.id.as_uuid())
        .bind(&product.name)
        .bind(product.unit_price.cents())
        .bind(i64::from(product.stock))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn product(&self, product_id: ProductId) -> Result<Option<Product>> {
        let row = sqlx::query("SELECT id, name, price_cents, stock FROM products WHERE id = $1")
            .bind(product_id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;

        row.map(row_to_product).transpose()
    }

    async fn add_cart_line(&self, line: &CartLine) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO cart_lines (customer_id, product_id, quantity)
            VALUES ($1, $2, $3)
            ON CONFLICT (customer_id, product_id) DO UPDATE
            SET quantity = EXCLUDED.quantity
            "#,
        )
        .bind(line.customer_id.as_uuid())
        .bind(line.product_id.as_uuid())
        .bind(i64::from(line.quantity))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn cart_lines(&self, customer_id: CustomerId) -> Result<Vec<CartLine>> {
        let rows = sqlx::query(
            "SELECT customer_id, product_id, quantity FROM cart_lines WHERE customer_id = $1",
        )
        .bind(customer_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(row_to_cart_line).collect()
    }
}
