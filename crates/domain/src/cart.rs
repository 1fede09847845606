//! Per-user cart service.

use std::collections::HashMap;

use order_store::{Money, ProductId, ProductWeightId, Store, UserId, line_total, order_total};
use serde::{Deserialize, Serialize};

use crate::error::{DomainError, Result};

/// One cart line priced at the current catalog price.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLineView {
    pub product_weight_id: ProductWeightId,
    pub product_id: ProductId,
    pub weight: String,
    pub measurement: String,
    pub unit_price: Money,
    pub quantity: u32,
    pub line_total: Money,
}

/// A user's cart with its derived total.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartView {
    pub user_id: UserId,
    pub lines: Vec<CartLineView>,
    pub total_price: Money,
}

impl CartView {
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

/// Service for reading and mutating user carts.
///
/// The store holds only variant ids and quantities. Prices are read from the
/// catalog every time a cart is viewed, so the total is never stale and never
/// supplied by a client.
#[derive(Clone)]
pub struct CartService<S: Store> {
    store: S,
}

impl<S: Store> CartService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Returns the user's cart. A user who never added anything has an empty
    /// cart.
    #[tracing::instrument(skip(self))]
    pub async fn get_cart(&self, user_id: UserId) -> Result<CartView> {
        require_user(user_id)?;

        let lines = self.store.cart_lines(user_id).await?;
        let ids: Vec<ProductWeightId> = lines.iter().map(|l| l.product_weight_id).collect();
        let weights: HashMap<_, _> = self
            .store
            .get_product_weights(&ids)
            .await?
            .into_iter()
            .map(|w| (w.id, w))
            .collect();

        let mut views = Vec::with_capacity(lines.len());
        for line in lines {
            let Some(weight) = weights.get(&line.product_weight_id) else {
                tracing::warn!(
                    product_weight_id = %line.product_weight_id,
                    "Cart line references a missing product weight"
                );
                continue;
            };
            views.push(CartLineView {
                product_weight_id: weight.id,
                product_id: weight.product_id,
                weight: weight.weight.clone(),
                measurement: weight.measurement.clone(),
                unit_price: weight.price,
                quantity: line.quantity,
                line_total: line_total(weight, line.quantity)?,
            });
        }

        let total_price = order_total(views.iter().map(|v| v.line_total))?;
        Ok(CartView {
            user_id,
            lines: views,
            total_price,
        })
    }

    /// Adds units of a variant to the cart, merging with an existing line.
    ///
    /// A missing or non-positive quantity adds one unit.
    #[tracing::instrument(skip(self))]
    pub async fn add_item(
        &self,
        user_id: UserId,
        product_weight_id: ProductWeightId,
        quantity: Option<i64>,
    ) -> Result<CartView> {
        require_user(user_id)?;
        require_weight(product_weight_id)?;
        let quantity = match quantity {
            Some(q) if q > 0 => to_quantity(q)?,
            _ => 1,
        };

        if self
            .store
            .get_product_weight(product_weight_id)
            .await?
            .is_none()
        {
            return Err(DomainError::NotFound(format!(
                "product weight {product_weight_id}"
            )));
        }

        self.store
            .add_cart_line(user_id, product_weight_id, quantity)
            .await?;
        metrics::counter!("cart_mutations_total", "op" => "add").increment(1);

        self.get_cart(user_id).await
    }

    /// Replaces a line's quantity. Zero removes the line.
    #[tracing::instrument(skip(self))]
    pub async fn update_item_quantity(
        &self,
        user_id: UserId,
        product_weight_id: ProductWeightId,
        quantity: i64,
    ) -> Result<CartView> {
        require_user(user_id)?;
        require_weight(product_weight_id)?;
        if quantity < 0 {
            return Err(DomainError::InvalidArgument(format!(
                "quantity must not be negative, got {quantity}"
            )));
        }
        if quantity == 0 {
            return self.remove_item(user_id, product_weight_id).await;
        }

        let updated = self
            .store
            .set_cart_line_quantity(user_id, product_weight_id, to_quantity(quantity)?)
            .await?;
        if !updated {
            return Err(missing_line(user_id, product_weight_id));
        }
        metrics::counter!("cart_mutations_total", "op" => "update").increment(1);

        self.get_cart(user_id).await
    }

    /// Deletes a line from the cart.
    #[tracing::instrument(skip(self))]
    pub async fn remove_item(
        &self,
        user_id: UserId,
        product_weight_id: ProductWeightId,
    ) -> Result<CartView> {
        require_user(user_id)?;
        require_weight(product_weight_id)?;

        if !self
            .store
            .remove_cart_line(user_id, product_weight_id)
            .await?
        {
            return Err(missing_line(user_id, product_weight_id));
        }
        metrics::counter!("cart_mutations_total", "op" => "remove").increment(1);

        self.get_cart(user_id).await
    }

    /// Empties the cart. Clearing an empty cart succeeds.
    #[tracing::instrument(skip(self))]
    pub async fn clear_cart(&self, user_id: UserId) -> Result<()> {
        require_user(user_id)?;

        let removed = self.store.clear_cart(user_id).await?;
        tracing::debug!(removed, "Cart cleared");
        metrics::counter!("cart_mutations_total", "op" => "clear").increment(1);
        Ok(())
    }
}

fn require_user(user_id: UserId) -> Result<()> {
    if user_id.is_valid() {
        Ok(())
    } else {
        Err(DomainError::InvalidArgument(format!(
            "user id must be positive, got {user_id}"
        )))
    }
}

fn require_weight(product_weight_id: ProductWeightId) -> Result<()> {
    if product_weight_id.is_valid() {
        Ok(())
    } else {
        Err(DomainError::InvalidArgument(format!(
            "product weight id must be positive, got {product_weight_id}"
        )))
    }
}

fn to_quantity(quantity: i64) -> Result<u32> {
    u32::try_from(quantity)
        .map_err(|_| DomainError::InvalidArgument(format!("quantity {quantity} is out of range")))
}

fn missing_line(user_id: UserId, product_weight_id: ProductWeightId) -> DomainError {
    DomainError::NotFound(format!(
        "cart line for product weight {product_weight_id} of user {user_id}"
    ))
}
