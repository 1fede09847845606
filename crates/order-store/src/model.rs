//! Rows the order core reads and writes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    AddressId, Money, OrderStatus, PaymentId, ProductId, ProductWeightId, PurchaseId, UserId,
};

/// One purchasable weight/size option of a product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductWeight {
    pub id: ProductWeightId,
    pub product_id: ProductId,
    /// Weight or size label, e.g. `"500"`.
    pub weight: String,
    /// Unit the label is expressed in, e.g. `"g"`.
    pub measurement: String,
    /// Current unit price.
    pub price: Money,
    /// Units currently available.
    pub stock: u32,
}

/// A catalog product with its weight variants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub weights: Vec<ProductWeight>,
}

impl Product {
    /// Finds the variant with the given id among this product's weights.
    pub fn weight(&self, id: ProductWeightId) -> Option<&ProductWeight> {
        self.weights.iter().find(|w| w.id == id)
    }
}

/// One line of a user's cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    pub product_weight_id: ProductWeightId,
    pub quantity: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A requested purchase line, before catalog resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DraftLine {
    pub product_id: ProductId,
    pub product_weight_id: ProductWeightId,
    pub quantity: u32,
}

/// Everything needed to place a purchase.
///
/// Carries no prices or names; the store resolves those from the catalog
/// inside the placement transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PurchaseDraft {
    pub user_id: UserId,
    pub address_id: AddressId,
    pub payment_id: PaymentId,
    pub lines: Vec<DraftLine>,
}

/// Catalog data frozen into a purchase at commit time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseItem {
    pub product_id: ProductId,
    pub product_name: String,
    pub product_weight_id: ProductWeightId,
    pub weight: String,
    pub measurement: String,
    pub unit_price: Money,
    pub quantity: u32,
    pub total_price: Money,
}

/// A committed purchase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Purchase {
    pub id: PurchaseId,
    pub user_id: UserId,
    pub address_id: AddressId,
    pub payment_id: PaymentId,
    /// Sum of the item totals, fixed at commit.
    pub total_price: Money,
    /// Current order status; `None` only for rows written outside the order core.
    pub status: Option<OrderStatus>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub items: Vec<PurchaseItem>,
}

/// How to reach a purchaser.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
    pub user_id: UserId,
    pub first_name: String,
    pub contact_number: String,
}
