//! Record types persisted by the stores.

use chrono::{DateTime, Utc};
use common::{CustomerId, OrderId, OrderLineId, ProductId};
use serde::{Deserialize, Serialize};

use crate::{DomainError, Money, OrderStatus};

/// A customer able to place orders. Identity and authentication live outside
/// this engine; only the existence check matters here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    pub id: CustomerId,
    pub email: String,
}

/// Stock view of a product: what checkout needs to price and reserve a line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    /// Current unit price; order lines snapshot it at purchase time.
    pub unit_price: Money,
    /// Units available. Never negative.
    pub stock: u32,
}

/// One line of a customer's cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    pub customer_id: CustomerId,
    pub product_id: ProductId,
    pub quantity: u32,
}

/// A durable order created by checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub customer_id: CustomerId,
    pub total: Money,
    pub status: OrderStatus,
    /// Processor reference for the payment authorization. Assigned once,
    /// after the checkout transaction commits; unique across orders.
    pub payment_reference: Option<String>,
    /// Processor reference for a refund, set on the paid -> refunded edge.
    pub refund_reference: Option<String>,
    pub refunded_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Creates a fresh pending order with a zero total, as checkout does
    /// before its lines are priced.
    pub fn pending(customer_id: CustomerId) -> Self {
        let now = Utc::now();
        Self {
            id: OrderId::new(),
            customer_id,
            total: Money::zero(),
            status: OrderStatus::Pending,
            payment_reference: None,
            refund_reference: None,
            refunded_at: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// An immutable order line capturing the unit price at purchase time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    pub id: OrderLineId,
    pub order_id: OrderId,
    pub product_id: ProductId,
    pub quantity: u32,
    /// Price per unit when the order was placed, independent of later
    /// product price changes.
    pub unit_price: Money,
    pub subtotal: Money,
}

impl OrderLine {
    /// Builds a priced line. Fails on a zero quantity, which would make the
    /// subtotal meaningless.
    pub fn price(
        order_id: OrderId,
        product_id: ProductId,
        quantity: u32,
        unit_price: Money,
    ) -> Result<Self, DomainError> {
        if quantity == 0 {
            return Err(DomainError::InvalidQuantity { quantity });
        }
        Ok(Self {
            id: OrderLineId::new(),
            order_id,
            product_id,
            quantity,
            unit_price,
            subtotal: unit_price.times(quantity),
        })
    }
}
