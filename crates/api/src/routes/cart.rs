//! Cart endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use domain::{CartView, Notifier};
use order_store::{AddressId, PaymentId, ProductWeightId, Store, UserId};
use serde::Deserialize;

use super::AppState;
use super::purchases::PurchaseCreatedResponse;
use crate::error::Result;

#[derive(Debug, Deserialize)]
pub struct AddItemQuery {
    pub quantity: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateQuantityQuery {
    pub quantity: i64,
}

#[derive(Debug, Deserialize)]
pub struct CheckoutRequest {
    pub address_id: AddressId,
    pub payment_id: PaymentId,
}

/// GET /cart/{user_id}: the user's cart priced at current catalog prices.
#[tracing::instrument(skip(state))]
pub async fn get<S: Store, N: Notifier>(
    State(state): State<Arc<AppState<S, N>>>,
    Path(user_id): Path<UserId>,
) -> Result<Json<CartView>> {
    Ok(Json(state.carts.get_cart(user_id).await?))
}

/// POST /cart/{user_id}/items/{product_weight_id}: add units of a variant.
#[tracing::instrument(skip(state))]
pub async fn add_item<S: Store, N: Notifier>(
    State(state): State<Arc<AppState<S, N>>>,
    Path((user_id, product_weight_id)): Path<(UserId, ProductWeightId)>,
    Query(query): Query<AddItemQuery>,
) -> Result<Json<CartView>> {
    let cart = state
        .carts
        .add_item(user_id, product_weight_id, query.quantity)
        .await?;
    Ok(Json(cart))
}

/// PUT /cart/{user_id}/items/{product_weight_id}: replace a line's quantity.
#[tracing::instrument(skip(state))]
pub async fn update_item<S: Store, N: Notifier>(
    State(state): State<Arc<AppState<S, N>>>,
    Path((user_id, product_weight_id)): Path<(UserId, ProductWeightId)>,
    Query(query): Query<UpdateQuantityQuery>,
) -> Result<Json<CartView>> {
    let cart = state
        .carts
        .update_item_quantity(user_id, product_weight_id, query.quantity)
        .await?;
    Ok(Json(cart))
}

/// DELETE /cart/{user_id}/items/{product_weight_id}
#[tracing::instrument(skip(state))]
pub async fn remove_item<S: Store, N: Notifier>(
    State(state): State<Arc<AppState<S, N>>>,
    Path((user_id, product_weight_id)): Path<(UserId, ProductWeightId)>,
) -> Result<Json<CartView>> {
    let cart = state.carts.remove_item(user_id, product_weight_id).await?;
    Ok(Json(cart))
}

/// DELETE /cart/{user_id}
#[tracing::instrument(skip(state))]
pub async fn clear<S: Store, N: Notifier>(
    State(state): State<Arc<AppState<S, N>>>,
    Path(user_id): Path<UserId>,
) -> Result<StatusCode> {
    state.carts.clear_cart(user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /cart/{user_id}/checkout: place a purchase for the cart contents.
#[tracing::instrument(skip(state, payload))]
pub async fn checkout<S: Store, N: Notifier>(
    State(state): State<Arc<AppState<S, N>>>,
    Path(user_id): Path<UserId>,
    payload: std::result::Result<Json<CheckoutRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<PurchaseCreatedResponse>)> {
    let Json(req) = payload?;
    let purchase = state
        .purchases
        .checkout_cart(user_id, req.address_id, req.payment_id)
        .await?;

    Ok((StatusCode::CREATED, Json(PurchaseCreatedResponse::from(&purchase))))
}
