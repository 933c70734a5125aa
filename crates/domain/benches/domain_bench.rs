use chrono::Utc;
use criterion::{Criterion, criterion_group, criterion_main};
use document_store::InMemoryDocumentStore;
use domain::{
    Currency, Customer, LineItem, Money, Mutation, Order, OrderStatus, Pricing, Product, Purchase,
    Repository, validate_transition,
};

fn sample_order(item_count: u32) -> Order {
    let items: Vec<_> = (0..item_count)
        .map(|n| {
            LineItem::product(
                format!("SKU-{n:03}").as_str(),
                format!("Product {n}").as_str(),
                1,
                Money::from_cents(100 * i64::from(n + 1)),
            )
        })
        .collect();
    let pricing = Pricing::compute(
        &items,
        Money::zero(),
        Money::zero(),
        Money::zero(),
        Currency::parse("NGN").unwrap(),
    )
    .unwrap();
    Order::new(
        Customer::new("bench@example.com", "Bench"),
        items,
        pricing,
        "bench",
        Utc::now(),
    )
}

fn bench_validate_all_pairs(c: &mut Criterion) {
    c.bench_function("domain/validate_all_order_pairs", |b| {
        b.iter(|| {
            let mut allowed = 0;
            for from in OrderStatus::ALL {
                for to in OrderStatus::ALL {
                    if validate_transition(from, to).is_ok() {
                        allowed += 1;
                    }
                }
            }
            allowed
        });
    });
}

fn bench_inventory_cycle(c: &mut Criterion) {
    c.bench_function("domain/reserve_commit", |b| {
        b.iter(|| {
            let mut product = Product::new("SKU-1", "Widget", Money::from_cents(1000), 1_000);
            for _ in 0..100 {
                product.reserve(2).unwrap();
                product.commit(2).unwrap();
            }
            product
        });
    });
}

fn bench_order_roundtrip(c: &mut Criterion) {
    let order = sample_order(50);

    c.bench_function("domain/order_json_roundtrip_50_items", |b| {
        b.iter(|| {
            let json = serde_json::to_value(&order).unwrap();
            let decoded: Order = serde_json::from_value(json).unwrap();
            decoded
        });
    });
}

fn bench_repository_update(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let repo: Repository<_, Order> = Repository::new(InMemoryDocumentStore::new());
    let mut order = sample_order(5);
    let id = order.id().to_string();
    rt.block_on(async { repo.insert(&mut order).await.unwrap() });

    c.bench_function("domain/repository_update_with", |b| {
        b.iter(|| {
            rt.block_on(async {
                repo.update_with(&id, |order| {
                    order.inventory_mut().inventory_reserved = !order.inventory().inventory_reserved;
                    Ok(Mutation::Changed(()))
                })
                .await
                .unwrap();
            });
        });
    });
}

criterion_group!(
    benches,
    bench_validate_all_pairs,
    bench_inventory_cycle,
    bench_order_roundtrip,
    bench_repository_update,
);
criterion_main!(benches);
