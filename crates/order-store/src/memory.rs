use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use crate::{
    CartLine, Contact, Money, OrderStatus, Product, ProductId, ProductWeight, ProductWeightId,
    Purchase, PurchaseDraft, PurchaseId, PurchaseItem, Result, StoreError, UserId,
    store::{
        CartStore, CatalogLookup, ContactLookup, OrderStatusStore, PurchaseStore, line_total,
        order_total, validate_draft,
    },
};

#[derive(Debug, Default)]
struct State {
    products: BTreeMap<ProductId, String>,
    weights: BTreeMap<ProductWeightId, ProductWeight>,
    contacts: HashMap<UserId, Contact>,
    carts: HashMap<UserId, Vec<CartLine>>,
    purchases: BTreeMap<PurchaseId, Purchase>,
    statuses: HashMap<PurchaseId, OrderStatus>,
    next_product_id: i64,
    next_weight_id: i64,
    next_purchase_id: i64,
    fail_on_place: bool,
}

impl State {
    fn with_status(&self, purchase: &Purchase) -> Purchase {
        let mut purchase = purchase.clone();
        purchase.status = self.statuses.get(&purchase.id).copied();
        purchase
    }
}

/// In-memory store implementation for testing and local runs.
///
/// Every operation runs under one write (or read) lock over the whole state,
/// which gives the same all-or-nothing behaviour as the PostgreSQL
/// transactions.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    state: Arc<RwLock<State>>,
}

impl InMemoryStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a catalog product and returns its id.
    pub async fn add_product(&self, name: impl Into<String>) -> ProductId {
        let mut state = self.state.write().await;
        state.next_product_id += 1;
        let id = ProductId::new(state.next_product_id);
        state.products.insert(id, name.into());
        id
    }

    /// Adds a weight variant to an existing product and returns its id.
    pub async fn add_product_weight(
        &self,
        product_id: ProductId,
        weight: impl Into<String>,
        measurement: impl Into<String>,
        price: Money,
        stock: u32,
    ) -> Result<ProductWeightId> {
        let mut state = self.state.write().await;
        if !state.products.contains_key(&product_id) {
            return Err(StoreError::ProductNotFound(product_id));
        }

        state.next_weight_id += 1;
        let id = ProductWeightId::new(state.next_weight_id);
        state.weights.insert(
            id,
            ProductWeight {
                id,
                product_id,
                weight: weight.into(),
                measurement: measurement.into(),
                price,
                stock,
            },
        );
        Ok(id)
    }

    /// Changes a variant's catalog price.
    pub async fn set_price(&self, id: ProductWeightId, price: Money) -> Result<()> {
        let mut state = self.state.write().await;
        let weight = state
            .weights
            .get_mut(&id)
            .ok_or(StoreError::UnknownProductWeight(id))?;
        weight.price = price;
        Ok(())
    }

    /// Changes a variant's stock level.
    pub async fn set_stock(&self, id: ProductWeightId, stock: u32) -> Result<()> {
        let mut state = self.state.write().await;
        let weight = state
            .weights
            .get_mut(&id)
            .ok_or(StoreError::UnknownProductWeight(id))?;
        weight.stock = stock;
        Ok(())
    }

    /// Returns a variant's current stock, if the variant exists.
    pub async fn stock(&self, id: ProductWeightId) -> Option<u32> {
        self.state.read().await.weights.get(&id).map(|w| w.stock)
    }

    /// Registers a purchaser's contact details.
    pub async fn add_contact(&self, contact: Contact) {
        self.state
            .write()
            .await
            .contacts
            .insert(contact.user_id, contact);
    }

    /// Configures placement to fail at commit time, after every line resolved.
    pub async fn set_fail_on_place(&self, fail: bool) {
        self.state.write().await.fail_on_place = fail;
    }

    /// Returns the total number of purchases stored.
    pub async fn purchase_count(&self) -> usize {
        self.state.read().await.purchases.len()
    }
}

#[async_trait]
impl CatalogLookup for InMemoryStore {
    async fn get_product(&self, product_id: ProductId) -> Result<Option<Product>> {
        let state = self.state.read().await;
        Ok(state.products.get(&product_id).map(|name| Product {
            id: product_id,
            name: name.clone(),
            weights: state
                .weights
                .values()
                .filter(|w| w.product_id == product_id)
                .cloned()
                .collect(),
        }))
    }

    async fn get_product_weight(&self, id: ProductWeightId) -> Result<Option<ProductWeight>> {
        Ok(self.state.read().await.weights.get(&id).cloned())
    }

    async fn get_product_weights(&self, ids: &[ProductWeightId]) -> Result<Vec<ProductWeight>> {
        let state = self.state.read().await;
        Ok(ids
            .iter()
            .filter_map(|id| state.weights.get(id).cloned())
            .collect())
    }
}

#[async_trait]
impl CartStore for InMemoryStore {
    async fn cart_lines(&self, user_id: UserId) -> Result<Vec<CartLine>> {
        let state = self.state.read().await;
        Ok(state.carts.get(&user_id).cloned().unwrap_or_default())
    }

    async fn add_cart_line(
        &self,
        user_id: UserId,
        product_weight_id: ProductWeightId,
        quantity: u32,
    ) -> Result<CartLine> {
        let mut state = self.state.write().await;
        if !state.weights.contains_key(&product_weight_id) {
            return Err(StoreError::UnknownProductWeight(product_weight_id));
        }

        let now = Utc::now();
        let lines = state.carts.entry(user_id).or_default();
        if let Some(line) = lines
            .iter_mut()
            .find(|l| l.product_weight_id == product_weight_id)
        {
            line.quantity = line
                .quantity
                .checked_add(quantity)
                .ok_or(StoreError::CartQuantityOverflow(product_weight_id))?;
            line.updated_at = now;
            return Ok(line.clone());
        }

        let line = CartLine {
            product_weight_id,
            quantity,
            created_at: now,
            updated_at: now,
        };
        lines.push(line.clone());
        Ok(line)
    }

    async fn set_cart_line_quantity(
        &self,
        user_id: UserId,
        product_weight_id: ProductWeightId,
        quantity: u32,
    ) -> Result<bool> {
        let mut state = self.state.write().await;
        let line = state.carts.get_mut(&user_id).and_then(|lines| {
            lines
                .iter_mut()
                .find(|l| l.product_weight_id == product_weight_id)
        });

        match line {
            Some(line) => {
                line.quantity = quantity;
                line.updated_at = Utc::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn remove_cart_line(
        &self,
        user_id: UserId,
        product_weight_id: ProductWeightId,
    ) -> Result<bool> {
        let mut state = self.state.write().await;
        let Some(lines) = state.carts.get_mut(&user_id) else {
            return Ok(false);
        };

        match lines
            .iter()
            .position(|l| l.product_weight_id == product_weight_id)
        {
            Some(index) => {
                lines.remove(index);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn clear_cart(&self, user_id: UserId) -> Result<u64> {
        let mut state = self.state.write().await;
        let removed = state.carts.remove(&user_id).map_or(0, |lines| lines.len());
        Ok(removed as u64)
    }
}

#[async_trait]
impl PurchaseStore for InMemoryStore {
    async fn place_purchase(&self, draft: PurchaseDraft) -> Result<Purchase> {
        validate_draft(&draft)?;

        let mut guard = self.state.write().await;
        let state = &mut *guard;

        // Resolve every line against a scratch copy of stock so that repeated
        // variants within one draft see each other's decrements.
        let mut remaining: HashMap<ProductWeightId, u32> = HashMap::new();
        let mut items = Vec::with_capacity(draft.lines.len());
        for line in &draft.lines {
            let product_name = state
                .products
                .get(&line.product_id)
                .ok_or(StoreError::ProductNotFound(line.product_id))?;
            let weight = state
                .weights
                .get(&line.product_weight_id)
                .filter(|w| w.product_id == line.product_id)
                .ok_or(StoreError::VariantNotFound {
                    product_id: line.product_id,
                    product_weight_id: line.product_weight_id,
                })?;

            let available = *remaining.entry(weight.id).or_insert(weight.stock);
            if line.quantity > available {
                return Err(StoreError::InsufficientStock {
                    product_weight_id: weight.id,
                    requested: line.quantity,
                    available,
                });
            }
            let total_price = line_total(weight, line.quantity)?;
            remaining.insert(weight.id, available - line.quantity);

            items.push(PurchaseItem {
                product_id: line.product_id,
                product_name: product_name.clone(),
                product_weight_id: weight.id,
                weight: weight.weight.clone(),
                measurement: weight.measurement.clone(),
                unit_price: weight.price,
                quantity: line.quantity,
                total_price,
            });
        }
        let total_price = order_total(items.iter().map(|i| i.total_price))?;

        if state.fail_on_place {
            return Err(StoreError::Database(sqlx::Error::Protocol(
                "simulated commit failure".to_string(),
            )));
        }

        for (id, stock) in remaining {
            if let Some(weight) = state.weights.get_mut(&id) {
                weight.stock = stock;
            }
        }

        state.next_purchase_id += 1;
        let id = PurchaseId::new(state.next_purchase_id);
        let now = Utc::now();
        let purchase = Purchase {
            id,
            user_id: draft.user_id,
            address_id: draft.address_id,
            payment_id: draft.payment_id,
            total_price,
            status: None,
            created_at: now,
            updated_at: now,
            items,
        };

        state.purchases.insert(id, purchase);
        state.carts.remove(&draft.user_id);
        state.statuses.insert(id, OrderStatus::Accepted);

        let placed = state.with_status(&state.purchases[&id]);
        Ok(placed)
    }

    async fn get_purchase(&self, purchase_id: PurchaseId) -> Result<Option<Purchase>> {
        let state = self.state.read().await;
        Ok(state
            .purchases
            .get(&purchase_id)
            .map(|p| state.with_status(p)))
    }

    async fn purchases_for_user(&self, user_id: UserId) -> Result<Vec<Purchase>> {
        let state = self.state.read().await;
        Ok(state
            .purchases
            .values()
            .rev()
            .filter(|p| p.user_id == user_id)
            .map(|p| state.with_status(p))
            .collect())
    }

    async fn list_purchases(&self) -> Result<Vec<Purchase>> {
        let state = self.state.read().await;
        Ok(state
            .purchases
            .values()
            .rev()
            .map(|p| state.with_status(p))
            .collect())
    }
}

#[async_trait]
impl OrderStatusStore for InMemoryStore {
    async fn get_order_status(&self, purchase_id: PurchaseId) -> Result<Option<OrderStatus>> {
        Ok(self.state.read().await.statuses.get(&purchase_id).copied())
    }

    async fn set_order_status(&self, purchase_id: PurchaseId, status: OrderStatus) -> Result<()> {
        let mut state = self.state.write().await;
        if !state.purchases.contains_key(&purchase_id) {
            return Err(StoreError::PurchaseNotFound(purchase_id));
        }
        state.statuses.insert(purchase_id, status);
        Ok(())
    }
}

#[async_trait]
impl ContactLookup for InMemoryStore {
    async fn get_contact(&self, user_id: UserId) -> Result<Option<Contact>> {
        Ok(self.state.read().await.contacts.get(&user_id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{AddressId, DraftLine, PaymentId};

    async fn seeded() -> (InMemoryStore, ProductId, ProductWeightId, ProductWeightId) {
        let store = InMemoryStore::new();
        let laddu = store.add_product("Laddu").await;
        let small = store
            .add_product_weight(laddu, "250", "g", Money::from_cents(5000), 10)
            .await
            .unwrap();
        let large = store
            .add_product_weight(laddu, "1", "kg", Money::from_cents(18000), 2)
            .await
            .unwrap();
        (store, laddu, small, large)
    }

    fn draft(user: i64, lines: Vec<DraftLine>) -> PurchaseDraft {
        PurchaseDraft {
            user_id: UserId::new(user),
            address_id: AddressId::new(3),
            payment_id: PaymentId::new(1),
            lines,
        }
    }

    fn line(product_id: ProductId, product_weight_id: ProductWeightId, quantity: u32) -> DraftLine {
        DraftLine {
            product_id,
            product_weight_id,
            quantity,
        }
    }

    #[tokio::test]
    async fn product_lookup_includes_its_weights() {
        let (store, laddu, small, large) = seeded().await;

        let product = store.get_product(laddu).await.unwrap().unwrap();
        assert_eq!(product.name, "Laddu");
        assert_eq!(product.weights.len(), 2);
        assert!(product.weight(small).is_some());
        assert!(product.weight(large).is_some());
        assert!(store.get_product(ProductId::new(99)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn weight_for_missing_product_is_rejected() {
        let store = InMemoryStore::new();
        let result = store
            .add_product_weight(ProductId::new(5), "1", "kg", Money::from_cents(100), 1)
            .await;
        assert!(matches!(result, Err(StoreError::ProductNotFound(_))));
    }

    #[tokio::test]
    async fn repeat_add_merges_into_one_line() {
        let (store, _, small, _) = seeded().await;
        let user = UserId::new(7);

        store.add_cart_line(user, small, 2).await.unwrap();
        let line = store.add_cart_line(user, small, 3).await.unwrap();

        assert_eq!(line.quantity, 5);
        assert_eq!(store.cart_lines(user).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn merge_past_u32_max_is_rejected_and_line_kept() {
        let (store, _, small, _) = seeded().await;
        let user = UserId::new(7);
        store.add_cart_line(user, small, u32::MAX).await.unwrap();

        let result = store.add_cart_line(user, small, 1).await;
        assert!(matches!(result, Err(StoreError::CartQuantityOverflow(id)) if id == small));
        assert_eq!(store.cart_lines(user).await.unwrap()[0].quantity, u32::MAX);
    }

    #[tokio::test]
    async fn add_unknown_weight_fails() {
        let store = InMemoryStore::new();
        let result = store
            .add_cart_line(UserId::new(1), ProductWeightId::new(42), 1)
            .await;
        assert!(matches!(result, Err(StoreError::UnknownProductWeight(_))));
    }

    #[tokio::test]
    async fn cart_lines_keep_insertion_order() {
        let (store, _, small, large) = seeded().await;
        let user = UserId::new(7);

        store.add_cart_line(user, large, 1).await.unwrap();
        store.add_cart_line(user, small, 1).await.unwrap();

        let ids: Vec<_> = store
            .cart_lines(user)
            .await
            .unwrap()
            .into_iter()
            .map(|l| l.product_weight_id)
            .collect();
        assert_eq!(ids, vec![large, small]);
    }

    #[tokio::test]
    async fn update_and_remove_report_missing_lines() {
        let (store, _, small, large) = seeded().await;
        let user = UserId::new(7);
        store.add_cart_line(user, small, 1).await.unwrap();

        assert!(store.set_cart_line_quantity(user, small, 4).await.unwrap());
        assert!(!store.set_cart_line_quantity(user, large, 4).await.unwrap());
        assert_eq!(store.cart_lines(user).await.unwrap()[0].quantity, 4);

        assert!(!store.remove_cart_line(user, large).await.unwrap());
        assert!(store.remove_cart_line(user, small).await.unwrap());
        assert!(store.cart_lines(user).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn clear_cart_is_idempotent() {
        let (store, _, small, _) = seeded().await;
        let user = UserId::new(7);
        store.add_cart_line(user, small, 1).await.unwrap();

        assert_eq!(store.clear_cart(user).await.unwrap(), 1);
        assert_eq!(store.clear_cart(user).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn place_purchase_snapshots_decrements_and_clears_cart() {
        let (store, laddu, small, large) = seeded().await;
        let user = UserId::new(7);
        store.add_cart_line(user, small, 2).await.unwrap();

        let purchase = store
            .place_purchase(draft(7, vec![line(laddu, small, 2), line(laddu, large, 1)]))
            .await
            .unwrap();

        assert_eq!(purchase.items.len(), 2);
        assert_eq!(purchase.items[0].product_name, "Laddu");
        assert_eq!(purchase.items[0].total_price.cents(), 10000);
        assert_eq!(purchase.total_price.cents(), 28000);
        assert_eq!(purchase.status, Some(OrderStatus::Accepted));
        assert_eq!(store.stock(small).await, Some(8));
        assert_eq!(store.stock(large).await, Some(1));
        assert!(store.cart_lines(user).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn insufficient_stock_leaves_everything_untouched() {
        let (store, laddu, small, large) = seeded().await;
        let user = UserId::new(7);
        store.add_cart_line(user, small, 1).await.unwrap();

        let result = store
            .place_purchase(draft(7, vec![line(laddu, small, 1), line(laddu, large, 3)]))
            .await;

        assert!(matches!(
            result,
            Err(StoreError::InsufficientStock {
                requested: 3,
                available: 2,
                ..
            })
        ));
        assert_eq!(store.stock(small).await, Some(10));
        assert_eq!(store.purchase_count().await, 0);
        assert_eq!(store.cart_lines(user).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn repeated_variant_lines_share_stock() {
        let (store, laddu, _, large) = seeded().await;

        let result = store
            .place_purchase(draft(7, vec![line(laddu, large, 2), line(laddu, large, 1)]))
            .await;

        assert!(matches!(result, Err(StoreError::InsufficientStock { .. })));
        assert_eq!(store.stock(large).await, Some(2));
    }

    #[tokio::test]
    async fn weight_of_another_product_is_variant_not_found() {
        let (store, _, small, _) = seeded().await;
        let barfi = store.add_product("Barfi").await;

        let result = store
            .place_purchase(draft(7, vec![line(barfi, small, 1)]))
            .await;
        assert!(matches!(result, Err(StoreError::VariantNotFound { .. })));
    }

    #[tokio::test]
    async fn commit_failure_rolls_back() {
        let (store, laddu, small, _) = seeded().await;
        store.add_cart_line(UserId::new(7), small, 1).await.unwrap();
        store.set_fail_on_place(true).await;

        let result = store
            .place_purchase(draft(7, vec![line(laddu, small, 1)]))
            .await;

        assert!(matches!(result, Err(StoreError::Database(_))));
        assert_eq!(store.stock(small).await, Some(10));
        assert_eq!(store.purchase_count().await, 0);
        assert_eq!(store.cart_lines(UserId::new(7)).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn purchases_are_listed_newest_first() {
        let (store, laddu, small, _) = seeded().await;
        let first = store
            .place_purchase(draft(7, vec![line(laddu, small, 1)]))
            .await
            .unwrap();
        let other_user = store
            .place_purchase(draft(8, vec![line(laddu, small, 1)]))
            .await
            .unwrap();
        let second = store
            .place_purchase(draft(7, vec![line(laddu, small, 1)]))
            .await
            .unwrap();

        let mine: Vec<_> = store
            .purchases_for_user(UserId::new(7))
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.id)
            .collect();
        assert_eq!(mine, vec![second.id, first.id]);
        assert_eq!(store.list_purchases().await.unwrap()[1].id, other_user.id);
    }

    #[tokio::test]
    async fn status_overwrite_requires_existing_purchase() {
        let (store, laddu, small, _) = seeded().await;
        let purchase = store
            .place_purchase(draft(7, vec![line(laddu, small, 1)]))
            .await
            .unwrap();

        store
            .set_order_status(purchase.id, OrderStatus::Delivered)
            .await
            .unwrap();
        assert_eq!(
            store.get_order_status(purchase.id).await.unwrap(),
            Some(OrderStatus::Delivered)
        );

        let missing = store
            .set_order_status(PurchaseId::new(99), OrderStatus::Delivered)
            .await;
        assert!(matches!(missing, Err(StoreError::PurchaseNotFound(_))));
        assert!(
            store
                .get_order_status(PurchaseId::new(99))
                .await
                .unwrap()
                .is_none()
        );
    }
}
