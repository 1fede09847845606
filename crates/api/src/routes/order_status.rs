//! Order status endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use domain::Notifier;
use order_store::{OrderStatus, PurchaseId, Store};
use serde::{Deserialize, Serialize};

use super::AppState;
use crate::error::Result;

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: String,
}

#[derive(Debug, Serialize)]
pub struct OrderStatusResponse {
    pub purchase_id: PurchaseId,
    pub status: OrderStatus,
}

/// GET /purchases/{purchase_id}/status
#[tracing::instrument(skip(state))]
pub async fn get<S: Store, N: Notifier>(
    State(state): State<Arc<AppState<S, N>>>,
    Path(purchase_id): Path<PurchaseId>,
) -> Result<Json<OrderStatusResponse>> {
    let status = state.order_status.get_status(purchase_id).await?;
    Ok(Json(OrderStatusResponse {
        purchase_id,
        status,
    }))
}

/// PUT /purchases/{purchase_id}/status: overwrite the status.
#[tracing::instrument(skip(state, payload))]
pub async fn update<S: Store, N: Notifier>(
    State(state): State<Arc<AppState<S, N>>>,
    Path(purchase_id): Path<PurchaseId>,
    payload: std::result::Result<Json<UpdateStatusRequest>, JsonRejection>,
) -> Result<Json<OrderStatusResponse>> {
    let Json(req) = payload?;
    let status = state
        .order_status
        .update_status(purchase_id, &req.status)
        .await?;
    Ok(Json(OrderStatusResponse {
        purchase_id,
        status,
    }))
}
