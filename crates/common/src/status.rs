//! Order status values.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Where a placed order is in its delivery lifecycle.
///
/// Placement always records `Accepted`. After that, status is set by
/// operational staff and any value may replace any other:
/// ```text
/// (absent) ──► Accepted ──► Preparing ──► OutForDelivery ──► Delivered
///                  │            │               │
///                  └────────────┴───────────────┴──► Cancelled
/// ```
/// The diagram shows the usual flow; it is not enforced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Order was placed and stock committed.
    Accepted,

    /// Kitchen is preparing the order.
    Preparing,

    /// Order has left for delivery.
    OutForDelivery,

    /// Order reached the customer.
    Delivered,

    /// Order was cancelled.
    Cancelled,
}

impl OrderStatus {
    /// Every status, in lifecycle order.
    pub const ALL: [OrderStatus; 5] = [
        OrderStatus::Accepted,
        OrderStatus::Preparing,
        OrderStatus::OutForDelivery,
        OrderStatus::Delivered,
        OrderStatus::Cancelled,
    ];

    /// Returns the wire and storage name of the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Accepted => "accepted",
            OrderStatus::Preparing => "preparing",
            OrderStatus::OutForDelivery => "out_for_delivery",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Returned when a string does not name an [`OrderStatus`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownOrderStatus(pub String);

impl std::fmt::Display for UnknownOrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "unknown order status '{}'", self.0)
    }
}

impl std::error::Error for UnknownOrderStatus {}

impl FromStr for OrderStatus {
    type Err = UnknownOrderStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        OrderStatus::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| UnknownOrderStatus(s.to_string()))
    }
}
