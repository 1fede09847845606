//! Purchase placement and history endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use domain::{Notifier, PurchaseRequest};
use order_store::{Money, Purchase, PurchaseId, Store, UserId};
use serde::Serialize;

use super::AppState;
use crate::error::Result;

#[derive(Debug, Serialize)]
pub struct PurchaseCreatedResponse {
    pub purchase_id: PurchaseId,
    pub total_price: Money,
}

impl From<&Purchase> for PurchaseCreatedResponse {
    fn from(purchase: &Purchase) -> Self {
        Self {
            purchase_id: purchase.id,
            total_price: purchase.total_price,
        }
    }
}

/// POST /purchases: place a purchase from an explicit item list.
#[tracing::instrument(skip(state, payload))]
pub async fn create<S: Store, N: Notifier>(
    State(state): State<Arc<AppState<S, N>>>,
    payload: std::result::Result<Json<PurchaseRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<PurchaseCreatedResponse>)> {
    let Json(req) = payload?;
    let purchase = state.purchases.create_purchase(req).await?;

    Ok((StatusCode::CREATED, Json(PurchaseCreatedResponse::from(&purchase))))
}

/// GET /purchases: every purchase, newest first.
#[tracing::instrument(skip(state))]
pub async fn list<S: Store, N: Notifier>(
    State(state): State<Arc<AppState<S, N>>>,
) -> Result<Json<Vec<Purchase>>> {
    Ok(Json(state.purchases.list_purchases().await?))
}

/// GET /purchases/{purchase_id}
#[tracing::instrument(skip(state))]
pub async fn get<S: Store, N: Notifier>(
    State(state): State<Arc<AppState<S, N>>>,
    Path(purchase_id): Path<PurchaseId>,
) -> Result<Json<Purchase>> {
    Ok(Json(state.purchases.get_purchase(purchase_id).await?))
}

/// GET /users/{user_id}/purchases: the user's history, newest first.
#[tracing::instrument(skip(state))]
pub async fn for_user<S: Store, N: Notifier>(
    State(state): State<Arc<AppState<S, N>>>,
    Path(user_id): Path<UserId>,
) -> Result<Json<Vec<Purchase>>> {
    Ok(Json(state.purchases.purchases_for_user(user_id).await?))
}
