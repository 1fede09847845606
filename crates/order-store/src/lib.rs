//! Persistence for the storefront order core.
//!
//! The [`Store`] trait bundles everything the order core reads and writes:
//! catalog lookups, per-user cart lines, purchases with their item snapshots,
//! order status and purchaser contacts. Two implementations are provided:
//! [`InMemoryStore`] for tests and local runs, and [`PostgresStore`].

pub mod error;
pub mod memory;
pub mod model;
pub mod postgres;
pub mod store;

pub use common::{
    AddressId, Money, OrderStatus, PaymentId, ProductId, ProductWeightId, PurchaseId, UserId,
};
pub use error::{Result, StoreError};
pub use memory::InMemoryStore;
pub use model::{
    CartLine, Contact, DraftLine, Product, ProductWeight, Purchase, PurchaseDraft, PurchaseItem,
};
pub use postgres::PostgresStore;
pub use store::{
    CartStore, CatalogLookup, ContactLookup, OrderStatusStore, PurchaseStore, Store, line_total,
    order_total, validate_draft,
};
