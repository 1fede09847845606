use serde::{Deserialize, Serialize};

/// Declares a row identifier newtype over the database's `BIGINT` keys.
///
/// Each identifier wraps an `i64` so that a user id can never be passed where a
/// purchase id is expected. Identifiers handed out by the store are always
/// positive; `is_valid` is what request validation checks.
macro_rules! row_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(i64);

        impl $name {
            /// Wraps a raw row id.
            pub const fn new(id: i64) -> Self {
                Self(id)
            }

            /// Returns the raw row id.
            pub const fn as_i64(&self) -> i64 {
                self.0
            }

            /// Returns true if the id could name a stored row (strictly positive).
            pub const fn is_valid(&self) -> bool {
                self.0 > 0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<i64> for $name {
            fn from(id: i64) -> Self {
                Self(id)
            }
        }

        impl From<$name> for i64 {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

row_id!(
    /// Identifier of a storefront user. Users are owned by account management;
    /// the order core only stores references to them.
    UserId
);

row_id!(
    /// Identifier of a catalog product.
    ProductId
);

row_id!(
    /// Identifier of a product weight variant, the unit that is priced and stocked.
    ProductWeightId
);

row_id!(
    /// Identifier of a committed purchase.
    PurchaseId
);

row_id!(
    /// Identifier of a delivery address in the user's address book.
    AddressId
);

row_id!(
    /// Identifier of a payment mode.
    PaymentId
);
