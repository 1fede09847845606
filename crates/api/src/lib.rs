//! HTTP API server for the storefront order core.
//!
//! Provides REST endpoints for carts, purchase placement, purchase history
//! and order status, with structured logging (tracing) and Prometheus metrics.

pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::routing::{get, post};
use domain::{CartService, DuplicateGuard, Notifier, OrderStatusService, PurchaseService};
use metrics_exporter_prometheus::PrometheusHandle;
use order_store::Store;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use routes::AppState;

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S: Store, N: Notifier>(
    state: Arc<AppState<S, N>>,
    metrics_handle: PrometheusHandle,
) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route(
            "/cart/{user_id}",
            get(routes::cart::get::<S, N>).delete(routes::cart::clear::<S, N>),
        )
        .route(
            "/cart/{user_id}/items/{product_weight_id}",
            post(routes::cart::add_item::<S, N>)
                .put(routes::cart::update_item::<S, N>)
                .delete(routes::cart::remove_item::<S, N>),
        )
        .route(
            "/cart/{user_id}/checkout",
            post(routes::cart::checkout::<S, N>),
        )
        .route(
            "/purchases",
            post(routes::purchases::create::<S, N>).get(routes::purchases::list::<S, N>),
        )
        .route(
            "/purchases/{purchase_id}",
            get(routes::purchases::get::<S, N>),
        )
        .route(
            "/purchases/{purchase_id}/status",
            get(routes::order_status::get::<S, N>).put(routes::order_status::update::<S, N>),
        )
        .route(
            "/users/{user_id}/purchases",
            get(routes::purchases::for_user::<S, N>),
        )
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Creates the application state over a store and notification channel.
pub fn create_default_state<S: Store, N: Notifier>(
    store: S,
    notifier: N,
    dedup_window: Duration,
) -> Arc<AppState<S, N>> {
    Arc::new(AppState {
        carts: CartService::new(store.clone()),
        purchases: PurchaseService::new(store.clone(), notifier)
            .with_guard(DuplicateGuard::new(dedup_window)),
        order_status: OrderStatusService::new(store),
    })
}
