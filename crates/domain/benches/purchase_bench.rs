use criterion::{Criterion, criterion_group, criterion_main};
use domain::{
    CartService, DuplicateGuard, LogNotifier, PurchaseRequest, PurchaseRequestItem,
    PurchaseService,
};
use order_store::{AddressId, InMemoryStore, Money, PaymentId, ProductId, ProductWeightId, UserId};
use std::time::Duration;

async fn seeded_store(stock: u32) -> (InMemoryStore, ProductId, Vec<ProductWeightId>) {
    let store = InMemoryStore::new();
    let product = store.add_product("Laddu").await;
    let mut weights = Vec::new();
    for (label, cents) in [("250", 3000), ("500", 5000), ("1000", 9000)] {
        weights.push(
            store
                .add_product_weight(product, label, "g", Money::from_cents(cents), stock)
                .await
                .unwrap(),
        );
    }
    (store, product, weights)
}

fn bench_create_purchase(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let (store, product, weights) = rt.block_on(seeded_store(u32::MAX));
    let service = PurchaseService::new(store, LogNotifier).with_guard(DuplicateGuard::new(Duration::ZERO));
    let mut user = 0i64;

    c.bench_function("domain/create_purchase_3_lines", |b| {
        b.iter(|| {
            user += 1;
            let request = PurchaseRequest {
                user_id: UserId::new(user),
                address_id: AddressId::new(1),
                payment_id: PaymentId::new(1),
                items: weights
                    .iter()
                    .map(|&product_weight_id| PurchaseRequestItem {
                        product_id: product,
                        product_weight_id,
                        quantity: 1,
                    })
                    .collect(),
            };
            rt.block_on(service.create_purchase(request)).unwrap();
        });
    });
}

fn bench_checkout_cart(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let (store, _, weights) = rt.block_on(seeded_store(u32::MAX));
    let carts = CartService::new(store.clone());
    let service = PurchaseService::new(store, LogNotifier).with_guard(DuplicateGuard::new(Duration::ZERO));
    let user = UserId::new(1);

    c.bench_function("domain/fill_cart_and_checkout", |b| {
        b.iter(|| {
            rt.block_on(async {
                for &weight in &weights {
                    carts.add_item(user, weight, Some(2)).await.unwrap();
                }
                service
                    .checkout_cart(user, AddressId::new(1), PaymentId::new(1))
                    .await
                    .unwrap();
            });
        });
    });
}

fn bench_get_cart(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let (store, _, weights) = rt.block_on(seeded_store(100));
    let carts = CartService::new(store);
    let user = UserId::new(1);
    rt.block_on(async {
        for &weight in &weights {
            carts.add_item(user, weight, Some(1)).await.unwrap();
        }
    });

    c.bench_function("domain/get_cart_3_lines", |b| {
        b.iter(|| {
            rt.block_on(carts.get_cart(user)).unwrap();
        });
    });
}

criterion_group!(
    benches,
    bench_create_purchase,
    bench_checkout_cart,
    bench_get_cart
);
criterion_main!(benches);
