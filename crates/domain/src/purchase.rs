//! Purchase workflow: validation, duplicate suppression, atomic placement and
//! post-commit notification.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use order_store::{
    AddressId, DraftLine, PaymentId, ProductId, ProductWeightId, Purchase, PurchaseDraft,
    PurchaseId, Store, UserId,
};
use serde::{Deserialize, Serialize};
use tracing::Instrument;

use crate::dedup::DuplicateGuard;
use crate::error::{DomainError, Result};
use crate::notify::Notifier;

/// One requested line of a purchase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseRequestItem {
    pub product_id: ProductId,
    pub product_weight_id: ProductWeightId,
    pub quantity: i64,
}

/// A purchase request as submitted by a client.
///
/// Carries ids and quantities only. Names and prices are resolved from the
/// catalog when the purchase is placed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseRequest {
    pub user_id: UserId,
    pub address_id: AddressId,
    pub payment_id: PaymentId,
    pub items: Vec<PurchaseRequestItem>,
}

impl PurchaseRequest {
    /// Checks the request shape and converts it into a storage draft.
    pub fn validate(&self) -> Result<PurchaseDraft> {
        if !self.user_id.is_valid() {
            return Err(invalid(format!(
                "user id must be positive, got {}",
                self.user_id
            )));
        }
        if !self.address_id.is_valid() {
            return Err(invalid(format!(
                "address id must be positive, got {}",
                self.address_id
            )));
        }
        if !self.payment_id.is_valid() {
            return Err(invalid(format!(
                "payment id must be positive, got {}",
                self.payment_id
            )));
        }
        if self.items.is_empty() {
            return Err(invalid("purchase must contain at least one item".to_string()));
        }

        let mut lines = Vec::with_capacity(self.items.len());
        for (index, item) in self.items.iter().enumerate() {
            if !item.product_id.is_valid() {
                return Err(invalid(format!(
                    "item {index}: product id must be positive, got {}",
                    item.product_id
                )));
            }
            if !item.product_weight_id.is_valid() {
                return Err(invalid(format!(
                    "item {index}: product weight id must be positive, got {}",
                    item.product_weight_id
                )));
            }
            let quantity = u32::try_from(item.quantity)
                .ok()
                .filter(|q| *q >= 1)
                .ok_or_else(|| {
                    invalid(format!(
                        "item {index}: quantity must be between 1 and {}, got {}",
                        u32::MAX,
                        item.quantity
                    ))
                })?;
            lines.push(DraftLine {
                product_id: item.product_id,
                product_weight_id: item.product_weight_id,
                quantity,
            });
        }

        Ok(PurchaseDraft {
            user_id: self.user_id,
            address_id: self.address_id,
            payment_id: self.payment_id,
            lines,
        })
    }

    /// Canonical serialization used as the duplicate-submission key.
    ///
    /// Field order is fixed by the struct definition, so two requests with
    /// equal fields always produce the same fingerprint.
    pub fn fingerprint(&self) -> Result<String> {
        serde_json::to_string(self)
            .map_err(|e| invalid(format!("request cannot be fingerprinted: {e}")))
    }
}

fn invalid(message: String) -> DomainError {
    DomainError::InvalidArgument(message)
}

/// Service that turns purchase requests into committed purchases.
pub struct PurchaseService<S: Store, N: Notifier> {
    store: S,
    notifier: Arc<N>,
    guard: DuplicateGuard,
}

impl<S: Store, N: Notifier> PurchaseService<S, N> {
    /// Creates a purchase service with the default duplicate window.
    pub fn new(store: S, notifier: N) -> Self {
        Self {
            store,
            notifier: Arc::new(notifier),
            guard: DuplicateGuard::default(),
        }
    }

    /// Replaces the duplicate-submission guard.
    pub fn with_guard(mut self, guard: DuplicateGuard) -> Self {
        self.guard = guard;
        self
    }

    pub fn guard(&self) -> &DuplicateGuard {
        &self.guard
    }

    /// Places a purchase.
    ///
    /// Malformed requests fail with `InvalidArgument` and repeats of an
    /// in-flight or recently accepted request fail with `DuplicateRequest`,
    /// both before storage is touched. Placement itself is one atomic store
    /// operation; any failure leaves stock, cart and purchases unchanged. The
    /// purchaser is notified afterwards on a background task.
    #[tracing::instrument(skip(self, request), fields(user_id = %request.user_id, items = request.items.len()))]
    pub async fn create_purchase(&self, request: PurchaseRequest) -> Result<Purchase> {
        let start = Instant::now();
        let result = self.place(request).await;

        match &result {
            Ok(purchase) => {
                metrics::counter!("purchases_created_total").increment(1);
                tracing::info!(
                    purchase_id = %purchase.id,
                    total = %purchase.total_price,
                    "Purchase placed"
                );
            }
            Err(e) => {
                metrics::counter!("purchases_rejected_total", "reason" => e.kind()).increment(1);
                tracing::info!(error = %e, "Purchase rejected");
            }
        }
        metrics::histogram!("purchase_duration_seconds").record(start.elapsed().as_secs_f64());

        result
    }

    async fn place(&self, request: PurchaseRequest) -> Result<Purchase> {
        let draft = request.validate()?;
        let permit = self.guard.try_acquire(request.fingerprint()?)?;

        let purchase = self.store.place_purchase(draft).await?;
        permit.commit();

        self.spawn_notification(&purchase);
        Ok(purchase)
    }

    /// Places a purchase for everything currently in the user's cart.
    #[tracing::instrument(skip(self))]
    pub async fn checkout_cart(
        &self,
        user_id: UserId,
        address_id: AddressId,
        payment_id: PaymentId,
    ) -> Result<Purchase> {
        if !user_id.is_valid() {
            return Err(invalid(format!("user id must be positive, got {user_id}")));
        }

        let lines = self.store.cart_lines(user_id).await?;
        if lines.is_empty() {
            return Err(invalid(format!("cart of user {user_id} is empty")));
        }

        let ids: Vec<ProductWeightId> = lines.iter().map(|l| l.product_weight_id).collect();
        let products: HashMap<ProductWeightId, ProductId> = self
            .store
            .get_product_weights(&ids)
            .await?
            .into_iter()
            .map(|w| (w.id, w.product_id))
            .collect();

        let items = lines
            .iter()
            .map(|line| -> Result<PurchaseRequestItem> {
                let product_id = products.get(&line.product_weight_id).copied().ok_or_else(|| {
                    DomainError::NotFound(format!("product weight {}", line.product_weight_id))
                })?;
                Ok(PurchaseRequestItem {
                    product_id,
                    product_weight_id: line.product_weight_id,
                    quantity: i64::from(line.quantity),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        self.create_purchase(PurchaseRequest {
            user_id,
            address_id,
            payment_id,
            items,
        })
        .await
    }

    /// Loads one purchase with its items and status.
    #[tracing::instrument(skip(self))]
    pub async fn get_purchase(&self, purchase_id: PurchaseId) -> Result<Purchase> {
        if !purchase_id.is_valid() {
            return Err(invalid(format!(
                "purchase id must be positive, got {purchase_id}"
            )));
        }

        self.store
            .get_purchase(purchase_id)
            .await?
            .ok_or_else(|| DomainError::NotFound(format!("purchase {purchase_id}")))
    }

    /// Returns the user's purchase history, newest first.
    #[tracing::instrument(skip(self))]
    pub async fn purchases_for_user(&self, user_id: UserId) -> Result<Vec<Purchase>> {
        if !user_id.is_valid() {
            return Err(invalid(format!("user id must be positive, got {user_id}")));
        }

        Ok(self.store.purchases_for_user(user_id).await?)
    }

    /// Returns every purchase, newest first.
    #[tracing::instrument(skip(self))]
    pub async fn list_purchases(&self) -> Result<Vec<Purchase>> {
        Ok(self.store.list_purchases().await?)
    }

    fn spawn_notification(&self, purchase: &Purchase) {
        let store = self.store.clone();
        let notifier = Arc::clone(&self.notifier);
        let user_id = purchase.user_id;
        let purchase_id = purchase.id;
        let summary = purchase
            .items
            .iter()
            .map(|item| format!("{} x {}", item.product_name, item.quantity))
            .collect::<Vec<_>>()
            .join(", ");

        tokio::spawn(
            async move {
                let contact = match store.get_contact(user_id).await {
                    Ok(Some(contact)) => contact,
                    Ok(None) => {
                        tracing::debug!("No contact on file, skipping notification");
                        return;
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "Contact lookup failed");
                        metrics::counter!("notifications_failed_total").increment(1);
                        return;
                    }
                };

                let message = order_placed_message(&contact.first_name, &summary);
                if let Err(e) = notifier.send(&contact.contact_number, &message).await {
                    tracing::warn!(error = %e, "Order notification failed");
                    metrics::counter!("notifications_failed_total").increment(1);
                }
            }
            .instrument(tracing::info_span!("notify_purchaser", purchase_id = %purchase_id, user_id = %user_id)),
        );
    }
}

/// Text sent to a purchaser once their order is committed.
pub fn order_placed_message(first_name: &str, summary: &str) -> String {
    format!("Hi {first_name}, your order for {summary} has been placed.")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(items: Vec<(i64, i64, i64)>) -> PurchaseRequest {
        PurchaseRequest {
            user_id: UserId::new(7),
            address_id: AddressId::new(3),
            payment_id: PaymentId::new(1),
            items: items
                .into_iter()
                .map(|(p, w, q)| PurchaseRequestItem {
                    product_id: ProductId::new(p),
                    product_weight_id: ProductWeightId::new(w),
                    quantity: q,
                })
                .collect(),
        }
    }

    #[test]
    fn valid_request_becomes_draft() {
        let draft = request(vec![(1, 12, 2), (1, 9, 1)]).validate().unwrap();

        assert_eq!(draft.user_id, UserId::new(7));
        assert_eq!(draft.lines.len(), 2);
        assert_eq!(draft.lines[0].quantity, 2);
        assert_eq!(draft.lines[1].product_weight_id, ProductWeightId::new(9));
    }

    #[test]
    fn empty_items_are_invalid() {
        assert!(matches!(
            request(vec![]).validate(),
            Err(DomainError::InvalidArgument(_))
        ));
    }

    #[test]
    fn non_positive_header_ids_are_invalid() {
        let mut r = request(vec![(1, 2, 1)]);
        r.user_id = UserId::new(0);
        assert!(r.validate().is_err());

        let mut r = request(vec![(1, 2, 1)]);
        r.address_id = AddressId::new(-3);
        assert!(r.validate().is_err());

        let mut r = request(vec![(1, 2, 1)]);
        r.payment_id = PaymentId::new(0);
        assert!(r.validate().is_err());
    }

    #[test]
    fn bad_item_fields_are_invalid() {
        assert!(request(vec![(0, 2, 1)]).validate().is_err());
        assert!(request(vec![(1, -2, 1)]).validate().is_err());
        assert!(request(vec![(1, 2, 0)]).validate().is_err());
        assert!(request(vec![(1, 2, -5)]).validate().is_err());
        assert!(request(vec![(1, 2, i64::MAX)]).validate().is_err());
    }

    #[test]
    fn fingerprint_is_stable_and_field_sensitive() {
        let a = request(vec![(1, 12, 2)]);
        let b = request(vec![(1, 12, 2)]);
        let c = request(vec![(1, 12, 3)]);

        assert_eq!(a.fingerprint().unwrap(), b.fingerprint().unwrap());
        assert_ne!(a.fingerprint().unwrap(), c.fingerprint().unwrap());
    }

    #[test]
    fn message_lists_items() {
        assert_eq!(
            order_placed_message("Asha", "Laddu x 2, Barfi x 1"),
            "Hi Asha, your order for Laddu x 2, Barfi x 1 has been placed."
        );
    }
}
