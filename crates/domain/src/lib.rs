//! Business types for the checkout engine.
//!
//! This crate is pure logic with no I/O: money arithmetic, the order status
//! state machine, and the record types the stores persist.

mod entities;
mod error;
mod money;
mod status;

pub use entities::{CartLine, Customer, Order, OrderLine, Product};
pub use error::DomainError;
pub use money::Money;
pub use status::OrderStatus;
