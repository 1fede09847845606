use async_trait::async_trait;

use crate::{
    CartLine, Contact, Money, OrderStatus, Product, ProductId, ProductWeight, ProductWeightId, Purchase,
    PurchaseDraft, PurchaseId, Result, StoreError, UserId,
};

/// Read access to the product catalog.
///
/// Catalog management lives elsewhere; the order core only resolves products
/// and variants by id. Stock is decremented by [`PurchaseStore::place_purchase`],
/// never through this trait.
#[async_trait]
pub trait CatalogLookup: Send + Sync {
    /// Loads a product with all of its weight variants.
    async fn get_product(&self, product_id: ProductId) -> Result<Option<Product>>;

    /// Loads a single weight variant.
    async fn get_product_weight(&self, id: ProductWeightId) -> Result<Option<ProductWeight>>;

    /// Loads every variant in `ids` that exists. Missing ids are skipped.
    async fn get_product_weights(&self, ids: &[ProductWeightId]) -> Result<Vec<ProductWeight>>;
}

/// Per-user cart lines.
///
/// A user has at most one line per weight variant. Each method is a single
/// atomic mutation; callers never observe a half-applied change.
#[async_trait]
pub trait CartStore: Send + Sync {
    /// Returns the user's lines in the order they were first added.
    ///
    /// A user without a cart has no lines; that is not an error.
    async fn cart_lines(&self, user_id: UserId) -> Result<Vec<CartLine>>;

    /// Adds `quantity` units of a variant to the user's cart.
    ///
    /// If a line for the variant exists its quantity is incremented, otherwise
    /// a new line is appended. Returns the resulting line. Fails with
    /// `UnknownProductWeight` if the variant does not exist.
    async fn add_cart_line(
        &self,
        user_id: UserId,
        product_weight_id: ProductWeightId,
        quantity: u32,
    ) -> Result<CartLine>;

    /// Replaces the quantity of an existing line.
    ///
    /// Returns `false` if the user has no line for the variant.
    async fn set_cart_line_quantity(
        &self,
        user_id: UserId,
        product_weight_id: ProductWeightId,
        quantity: u32,
    ) -> Result<bool>;

    /// Deletes a line. Returns `false` if the user has no line for the variant.
    async fn remove_cart_line(
        &self,
        user_id: UserId,
        product_weight_id: ProductWeightId,
    ) -> Result<bool>;

    /// Deletes all of the user's lines, returning how many were removed.
    async fn clear_cart(&self, user_id: UserId) -> Result<u64>;
}

/// Purchases and their item snapshots.
#[async_trait]
pub trait PurchaseStore: Send + Sync {
    /// Places a purchase in a single transaction.
    ///
    /// For every line, in order: resolves the product (`ProductNotFound`) and
    /// the variant within it (`VariantNotFound`), checks the requested quantity
    /// against current stock (`InsufficientStock`) while holding the variant
    /// against concurrent placements, decrements stock and snapshots name,
    /// weight and unit price. Then inserts the purchase header and items,
    /// deletes all of the user's cart lines and records the `Accepted` status.
    ///
    /// Any failure rolls everything back: no purchase, no stock change, no
    /// cart change.
    async fn place_purchase(&self, draft: PurchaseDraft) -> Result<Purchase>;

    /// Loads a purchase with its items and current status.
    async fn get_purchase(&self, purchase_id: PurchaseId) -> Result<Option<Purchase>>;

    /// Returns the user's purchases, newest first.
    async fn purchases_for_user(&self, user_id: UserId) -> Result<Vec<Purchase>>;

    /// Returns every purchase, newest first.
    async fn list_purchases(&self) -> Result<Vec<Purchase>>;
}

/// Order status keyed by purchase.
#[async_trait]
pub trait OrderStatusStore: Send + Sync {
    /// Returns the purchase's status, or `None` if no status row exists.
    async fn get_order_status(&self, purchase_id: PurchaseId) -> Result<Option<OrderStatus>>;

    /// Overwrites the purchase's status unconditionally.
    ///
    /// Fails with `PurchaseNotFound` if the purchase does not exist.
    async fn set_order_status(&self, purchase_id: PurchaseId, status: OrderStatus) -> Result<()>;
}

/// Purchaser contact details, owned by account management.
#[async_trait]
pub trait ContactLookup: Send + Sync {
    async fn get_contact(&self, user_id: UserId) -> Result<Option<Contact>>;
}

/// Everything the order core needs from storage.
pub trait Store:
    CatalogLookup + CartStore + PurchaseStore + OrderStatusStore + ContactLookup + Clone + 'static
{
}

// Blanket implementation for every type providing all store capabilities
impl<T> Store for T where
    T: CatalogLookup + CartStore + PurchaseStore + OrderStatusStore + ContactLookup + Clone + 'static
{
}

/// Validates a draft before a placement transaction is opened.
pub fn validate_draft(draft: &PurchaseDraft) -> Result<()> {
    if draft.lines.is_empty() {
        return Err(StoreError::InvalidDraft(
            "Cannot place a purchase without lines".to_string(),
        ));
    }

    if let Some(line) = draft.lines.iter().find(|l| l.quantity == 0) {
        return Err(StoreError::InvalidDraft(format!(
            "Line for product weight {} has zero quantity",
            line.product_weight_id
        )));
    }

    Ok(())
}

/// Prices `quantity` units of a variant at its current catalog price.
pub fn line_total(weight: &ProductWeight, quantity: u32) -> Result<Money> {
    weight
        .price
        .checked_multiply(quantity)
        .ok_or_else(|| StoreError::Corrupt {
            table: "product_weights",
            message: format!(
                "price {} of product weight {} times {quantity} overflows",
                weight.price.cents(),
                weight.id
            ),
        })
}

/// Sums line totals into an order total.
pub fn order_total<I: IntoIterator<Item = Money>>(line_totals: I) -> Result<Money> {
    Money::checked_sum(line_totals).ok_or_else(|| StoreError::Corrupt {
        table: "product_weights",
        message: "order total overflows".to_string(),
    })
}
