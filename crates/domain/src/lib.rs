//! Order placement core for the storefront.
//!
//! This crate provides the services that sit between the HTTP layer and
//! storage:
//! - [`CartService`] for per-user carts with derived totals
//! - [`PurchaseService`] for the purchase workflow and purchase history
//! - [`DuplicateGuard`] for short-window suppression of repeated submissions
//! - [`OrderStatusService`] for reading and overwriting order status
//! - [`Notifier`] for best-effort purchaser notifications

pub mod cart;
pub mod dedup;
pub mod error;
pub mod notify;
pub mod order_status;
pub mod purchase;

pub use cart::{CartLineView, CartService, CartView};
pub use dedup::{DEFAULT_DEDUP_WINDOW, DuplicateGuard, Permit};
pub use error::{DomainError, Result};
pub use notify::{InMemoryNotifier, LogNotifier, Notifier, NotifyError, SentMessage};
pub use order_status::OrderStatusService;
pub use purchase::{PurchaseRequest, PurchaseRequestItem, PurchaseService, order_placed_message};
