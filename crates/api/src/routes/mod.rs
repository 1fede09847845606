//! HTTP route handlers.

pub mod cart;
pub mod health;
pub mod metrics;
pub mod order_status;
pub mod purchases;

use domain::{CartService, Notifier, OrderStatusService, PurchaseService};
use order_store::Store;

/// Shared application state accessible from all handlers.
pub struct AppState<S: Store, N: Notifier> {
    pub carts: CartService<S>,
    pub purchases: PurchaseService<S, N>,
    pub order_status: OrderStatusService<S>,
}
