use thiserror::Error;

use crate::{ProductId, ProductWeightId, PurchaseId};

/// Errors that can occur when interacting with the store.
///
/// The first group are business outcomes detected inside a storage
/// transaction; when one of them is returned the transaction has already been
/// rolled back.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The product named by a purchase line does not exist.
    #[error("Product not found: {0}")]
    ProductNotFound(ProductId),

    /// The weight variant does not exist or belongs to another product.
    #[error("Weight variant {product_weight_id} not found for product {product_id}")]
    VariantNotFound {
        product_id: ProductId,
        product_weight_id: ProductWeightId,
    },

    /// A cart line referenced a weight variant that does not exist.
    #[error("Unknown product weight: {0}")]
    UnknownProductWeight(ProductWeightId),

    /// Merging into an existing cart line would push its quantity past
    /// `u32::MAX`. The line is left unchanged.
    #[error("Cart quantity for product weight {0} would exceed {max}", max = u32::MAX)]
    CartQuantityOverflow(ProductWeightId),

    /// A purchase line asked for more units than are in stock.
    #[error(
        "Insufficient stock for product weight {product_weight_id}: requested {requested}, available {available}"
    )]
    InsufficientStock {
        product_weight_id: ProductWeightId,
        requested: u32,
        available: u32,
    },

    /// The purchase does not exist.
    #[error("Purchase not found: {0}")]
    PurchaseNotFound(PurchaseId),

    /// A purchase draft was rejected before any storage work began.
    #[error("Invalid purchase draft: {0}")]
    InvalidDraft(String),

    /// A stored value could not be mapped back into the model.
    #[error("Corrupt row in {table}: {message}")]
    Corrupt { table: &'static str, message: String },

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
