//! Domain error types.

use order_store::{ProductId, ProductWeightId, StoreError};
use thiserror::Error;

/// Errors that can occur during order core operations.
#[derive(Debug, Error)]
pub enum DomainError {
    /// The request was malformed: bad id, non-positive quantity, empty item
    /// list or unknown status value.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// A cart line, purchase or variant referenced outside a purchase does
    /// not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// A purchase line named a product that does not exist.
    #[error("Product not found: {0}")]
    ProductNotFound(ProductId),

    /// A purchase line named a weight variant that is not part of its product.
    #[error("Weight variant {product_weight_id} not found for product {product_id}")]
    VariantNotFound {
        product_id: ProductId,
        product_weight_id: ProductWeightId,
    },

    /// A purchase line asked for more units than are in stock.
    #[error(
        "Insufficient stock for product weight {product_weight_id}: requested {requested}, available {available}"
    )]
    InsufficientStock {
        product_weight_id: ProductWeightId,
        requested: u32,
        available: u32,
    },

    /// An identical purchase request is in flight or was accepted within the
    /// duplicate window.
    #[error("Duplicate purchase request")]
    DuplicateRequest,

    /// The storage layer failed.
    #[error("Storage error: {0}")]
    Storage(StoreError),
}

impl DomainError {
    /// Short machine-readable name of the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            DomainError::InvalidArgument(_) => "invalid_argument",
            DomainError::NotFound(_) => "not_found",
            DomainError::ProductNotFound(_) => "product_not_found",
            DomainError::VariantNotFound { .. } => "variant_not_found",
            DomainError::InsufficientStock { .. } => "insufficient_stock",
            DomainError::DuplicateRequest => "duplicate_request",
            DomainError::Storage(_) => "storage",
        }
    }
}

impl From<StoreError> for DomainError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::ProductNotFound(id) => DomainError::ProductNotFound(id),
            StoreError::VariantNotFound {
                product_id,
                product_weight_id,
            } => DomainError::VariantNotFound {
                product_id,
                product_weight_id,
            },
            StoreError::InsufficientStock {
                product_weight_id,
                requested,
                available,
            } => DomainError::InsufficientStock {
                product_weight_id,
                requested,
                available,
            },
            StoreError::UnknownProductWeight(id) => {
                DomainError::NotFound(format!("product weight {id}"))
            }
            StoreError::PurchaseNotFound(id) => DomainError::NotFound(format!("purchase {id}")),
            StoreError::InvalidDraft(msg) => DomainError::InvalidArgument(msg),
            e @ StoreError::CartQuantityOverflow(_) => DomainError::InvalidArgument(e.to_string()),
            other => DomainError::Storage(other),
        }
    }
}

/// Result type for domain operations.
pub type Result<T> = std::result::Result<T, DomainError>;
