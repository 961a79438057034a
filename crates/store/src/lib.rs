//! Persistence boundary for the checkout engine.
//!
//! [`Store`] is the non-transactional surface (order lookups, conditional
//! status updates, seeding). [`CheckoutTx`] is the unit of work the checkout
//! orchestrator drives: every mutation inside it commits atomically or not at
//! all. [`PostgresStore`] is the production implementation;
//! [`InMemoryStore`] mirrors its semantics for tests.

mod error;
mod memory;
mod postgres;
mod store;

pub use error::{Result, StoreError};
pub use memory::{InMemoryCheckoutTx, InMemoryStore};
pub use postgres::{PostgresCheckoutTx, PostgresStore};
pub use store::{CheckoutTx, StatusTransition, Store};
