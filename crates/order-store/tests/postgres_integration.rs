//! PostgreSQL integration tests
//!
//! These tests use a shared PostgreSQL container and need a container runtime,
//! so they are ignored by default. Run with:
//!
//! ```bash
//! cargo test -p order-store --test postgres_integration -- --ignored --test-threads=1
//! ```

use std::sync::Arc;

use order_store::{
    AddressId, CartStore, CatalogLookup, ContactLookup, DraftLine, OrderStatus, OrderStatusStore,
    PaymentId, PostgresStore, ProductId, ProductWeightId, PurchaseDraft, PurchaseId,
    PurchaseStore, StoreError, UserId,
};
use serial_test::serial;
use sqlx::PgPool;
use testcontainers::{ContainerAsync, runners::AsyncRunner};
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;

/// Shared container info - container stays alive for all tests
struct ContainerInfo {
    #[allow(dead_code)] // Container must stay alive for tests
    container: ContainerAsync<Postgres>,
    connection_string: String,
}

/// Global shared container
static CONTAINER: OnceCell<Arc<ContainerInfo>> = OnceCell::const_new();

async fn get_container_info() -> Arc<ContainerInfo> {
    CONTAINER
        .get_or_init(|| async {
            let container = Postgres::default().start().await.unwrap();

            let host = container.get_host().await.unwrap();
            let port = container.get_host_port_ipv4(5432).await.unwrap();

            let connection_string =
                format!("postgres://postgres:postgres@{}:{}/postgres", host, port);

            let temp_pool = PgPool::connect(&connection_string).await.unwrap();
            PostgresStore::new(temp_pool.clone())
                .run_migrations()
                .await
                .unwrap();
            temp_pool.close().await;

            Arc::new(ContainerInfo {
                container,
                connection_string,
            })
        })
        .await
        .clone()
}

/// Get a fresh store with its own pool and cleared tables
async fn get_test_store() -> PostgresStore {
    let info = get_container_info().await;

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(&info.connection_string)
        .await
        .unwrap();

    sqlx::query(
        "TRUNCATE TABLE order_status, purchase_items, purchases, cart_items, users, product_weights, products RESTART IDENTITY CASCADE",
    )
    .execute(&pool)
    .await
    .unwrap();

    PostgresStore::new(pool)
}

async fn seed_product(store: &PostgresStore, name: &str) -> ProductId {
    let id: i64 = sqlx::query_scalar("INSERT INTO products (name) VALUES ($1) RETURNING id")
        .bind(name)
        .fetch_one(store.pool())
        .await
        .unwrap();
    ProductId::new(id)
}

async fn seed_weight(
    store: &PostgresStore,
    product_id: ProductId,
    price_cents: i64,
    stock: i64,
) -> ProductWeightId {
    let id: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO product_weights (product_id, weight, measurement, price_cents, stock)
        VALUES ($1, '500', 'g', $2, $3)
        RETURNING id
        "#,
    )
    .bind(product_id.as_i64())
    .bind(price_cents)
    .bind(stock)
    .fetch_one(store.pool())
    .await
    .unwrap();
    ProductWeightId::new(id)
}

fn draft(user: i64, lines: Vec<(ProductId, ProductWeightId, u32)>) -> PurchaseDraft {
    PurchaseDraft {
        user_id: UserId::new(user),
        address_id: AddressId::new(3),
        payment_id: PaymentId::new(1),
        lines: lines
            .into_iter()
            .map(|(product_id, product_weight_id, quantity)| DraftLine {
                product_id,
                product_weight_id,
                quantity,
            })
            .collect(),
    }
}

#[tokio::test]
#[serial]
#[ignore = "requires a container runtime"]
async fn cart_add_merges_lines() {
    let store = get_test_store().await;
    let product = seed_product(&store, "Laddu").await;
    let weight = seed_weight(&store, product, 5000, 10).await;
    let user = UserId::new(7);

    store.add_cart_line(user, weight, 2).await.unwrap();
    let line = store.add_cart_line(user, weight, 3).await.unwrap();

    assert_eq!(line.quantity, 5);
    assert_eq!(store.cart_lines(user).await.unwrap().len(), 1);
}

#[tokio::test]
#[serial]
#[ignore = "requires a container runtime"]
async fn cart_add_past_u32_max_leaves_line_readable() {
    let store = get_test_store().await;
    let product = seed_product(&store, "Laddu").await;
    let weight = seed_weight(&store, product, 5000, 10).await;
    let user = UserId::new(7);
    store.add_cart_line(user, weight, u32::MAX).await.unwrap();

    let result = store.add_cart_line(user, weight, 1).await;
    assert!(matches!(result, Err(StoreError::CartQuantityOverflow(_))));

    let lines = store.cart_lines(user).await.unwrap();
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0].quantity, u32::MAX);
}

#[tokio::test]
#[serial]
#[ignore = "requires a container runtime"]
async fn cart_add_unknown_weight_fails() {
    let store = get_test_store().await;

    let result = store
        .add_cart_line(UserId::new(7), ProductWeightId::new(999), 1)
        .await;
    assert!(matches!(result, Err(StoreError::UnknownProductWeight(_))));
}

#[tokio::test]
#[serial]
#[ignore = "requires a container runtime"]
async fn place_purchase_commits_everything() {
    let store = get_test_store().await;
    let product = seed_product(&store, "Laddu").await;
    let w12 = seed_weight(&store, product, 5000, 10).await;
    let w9 = seed_weight(&store, product, 3000, 10).await;
    let user = UserId::new(7);
    store.add_cart_line(user, w12, 2).await.unwrap();
    store.add_cart_line(user, w9, 1).await.unwrap();

    let purchase = store
        .place_purchase(draft(7, vec![(product, w12, 2), (product, w9, 1)]))
        .await
        .unwrap();

    assert_eq!(purchase.total_price.cents(), 13000);
    let loaded = store.get_purchase(purchase.id).await.unwrap().unwrap();
    assert_eq!(loaded.items.len(), 2);
    assert_eq!(loaded.status, Some(OrderStatus::Accepted));
    assert_eq!(
        store.get_product_weight(w12).await.unwrap().unwrap().stock,
        8
    );
    assert!(store.cart_lines(user).await.unwrap().is_empty());
}

#[tokio::test]
#[serial]
#[ignore = "requires a container runtime"]
async fn insufficient_stock_rolls_back() {
    let store = get_test_store().await;
    let product = seed_product(&store, "Laddu").await;
    let plenty = seed_weight(&store, product, 5000, 10).await;
    let scarce = seed_weight(&store, product, 3000, 1).await;
    store.add_cart_line(UserId::new(7), plenty, 1).await.unwrap();

    let result = store
        .place_purchase(draft(7, vec![(product, plenty, 4), (product, scarce, 2)]))
        .await;

    assert!(matches!(result, Err(StoreError::InsufficientStock { .. })));
    assert_eq!(
        store.get_product_weight(plenty).await.unwrap().unwrap().stock,
        10
    );
    assert!(store.list_purchases().await.unwrap().is_empty());
    assert_eq!(store.cart_lines(UserId::new(7)).await.unwrap().len(), 1);
}

#[tokio::test]
#[serial]
#[ignore = "requires a container runtime"]
async fn concurrent_purchases_never_oversell() {
    let store = get_test_store().await;
    let product = seed_product(&store, "Barfi").await;
    let weight = seed_weight(&store, product, 1000, 3).await;

    let a = store.clone();
    let b = store.clone();
    let (ra, rb) = tokio::join!(
        a.place_purchase(draft(1, vec![(product, weight, 2)])),
        b.place_purchase(draft(2, vec![(product, weight, 2)])),
    );

    let successes = [ra.is_ok(), rb.is_ok()].into_iter().filter(|ok| *ok).count();
    assert_eq!(successes, 1);
    assert_eq!(
        store.get_product_weight(weight).await.unwrap().unwrap().stock,
        1
    );
}

#[tokio::test]
#[serial]
#[ignore = "requires a container runtime"]
async fn snapshot_survives_price_change() {
    let store = get_test_store().await;
    let product = seed_product(&store, "Laddu").await;
    let weight = seed_weight(&store, product, 5000, 10).await;

    let purchase = store
        .place_purchase(draft(7, vec![(product, weight, 2)]))
        .await
        .unwrap();
    sqlx::query("UPDATE product_weights SET price_cents = 9999 WHERE id = $1")
        .bind(weight.as_i64())
        .execute(store.pool())
        .await
        .unwrap();

    let loaded = store.get_purchase(purchase.id).await.unwrap().unwrap();
    assert_eq!(loaded.items[0].unit_price.cents(), 5000);
    assert_eq!(loaded.items[0].total_price.cents(), 10000);
}

#[tokio::test]
#[serial]
#[ignore = "requires a container runtime"]
async fn order_status_overwrite_and_missing_purchase() {
    let store = get_test_store().await;
    let product = seed_product(&store, "Laddu").await;
    let weight = seed_weight(&store, product, 5000, 10).await;
    let purchase = store
        .place_purchase(draft(7, vec![(product, weight, 1)]))
        .await
        .unwrap();

    store
        .set_order_status(purchase.id, OrderStatus::Preparing)
        .await
        .unwrap();
    assert_eq!(
        store.get_order_status(purchase.id).await.unwrap(),
        Some(OrderStatus::Preparing)
    );

    let missing = store
        .set_order_status(PurchaseId::new(404), OrderStatus::Preparing)
        .await;
    assert!(matches!(missing, Err(StoreError::PurchaseNotFound(_))));
}

#[tokio::test]
#[serial]
#[ignore = "requires a container runtime"]
async fn contact_lookup() {
    let store = get_test_store().await;
    let id: i64 = sqlx::query_scalar(
        "INSERT INTO users (first_name, contact_number) VALUES ('Asha', '+910000000000') RETURNING id",
    )
    .fetch_one(store.pool())
    .await
    .unwrap();

    let contact = store.get_contact(UserId::new(id)).await.unwrap().unwrap();
    assert_eq!(contact.first_name, "Asha");
    assert!(store.get_contact(UserId::new(id + 1)).await.unwrap().is_none());
}
