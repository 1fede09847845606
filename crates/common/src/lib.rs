//! Shared types for the storefront order core.

pub mod money;
pub mod status;
pub mod types;

pub use money::Money;
pub use status::{OrderStatus, UnknownOrderStatus};
pub use types::{AddressId, PaymentId, ProductId, ProductWeightId, PurchaseId, UserId};
