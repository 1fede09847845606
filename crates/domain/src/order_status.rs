//! Order status tracking.

use order_store::{OrderStatus, PurchaseId, Store};

use crate::error::{DomainError, Result};

/// Service for reading and overwriting a purchase's order status.
///
/// Placement seeds every purchase with `accepted`. Afterwards any known status
/// may be written at any time; no transition rules are enforced.
#[derive(Clone)]
pub struct OrderStatusService<S: Store> {
    store: S,
}

impl<S: Store> OrderStatusService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Returns the purchase's current status.
    #[tracing::instrument(skip(self))]
    pub async fn get_status(&self, purchase_id: PurchaseId) -> Result<OrderStatus> {
        require_purchase(purchase_id)?;

        self.store
            .get_order_status(purchase_id)
            .await?
            .ok_or_else(|| DomainError::NotFound(format!("order status for purchase {purchase_id}")))
    }

    /// Overwrites the purchase's status with `status`.
    ///
    /// Unknown or empty status names are `InvalidArgument`; an unknown
    /// purchase is `NotFound`.
    #[tracing::instrument(skip(self))]
    pub async fn update_status(&self, purchase_id: PurchaseId, status: &str) -> Result<OrderStatus> {
        require_purchase(purchase_id)?;
        let status: OrderStatus = status
            .parse()
            .map_err(|e: common::UnknownOrderStatus| DomainError::InvalidArgument(e.to_string()))?;

        self.store.set_order_status(purchase_id, status).await?;
        metrics::counter!("order_status_updates_total").increment(1);
        tracing::info!(status = %status, "Order status updated");

        Ok(status)
    }
}

fn require_purchase(purchase_id: PurchaseId) -> Result<()> {
    if purchase_id.is_valid() {
        Ok(())
    } else {
        Err(DomainError::InvalidArgument(format!(
            "purchase id must be positive, got {purchase_id}"
        )))
    }
}
