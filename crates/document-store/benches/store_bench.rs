use criterion::{Criterion, criterion_group, criterion_main};
use document_store::{
    Document, DocumentQuery, DocumentStore, DocumentStoreExt, InMemoryDocumentStore, Version,
    WriteOp,
};

fn make_product(id: usize, quantity: i64) -> Document {
    Document::new(
        "products",
        format!("SKU-{id:04}"),
        serde_json::json!({
            "name": "Benchmark Widget",
            "status": "active",
            "inventory": {"quantity": quantity, "reserved": 0, "available": quantity}
        }),
    )
}

fn bench_insert_single(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();

    c.bench_function("document_store/insert_single", |b| {
        b.iter(|| {
            rt.block_on(async {
                let store = InMemoryDocumentStore::new();
                store.insert(make_product(1, 10)).await.unwrap();
            });
        });
    });
}

fn bench_batch_update_10(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();

    c.bench_function("document_store/batch_update_10", |b| {
        b.iter(|| {
            rt.block_on(async {
                let store = InMemoryDocumentStore::new();
                for i in 0..10 {
                    store.insert(make_product(i, 10)).await.unwrap();
                }
                let ops: Vec<WriteOp> = (0..10)
                    .map(|i| WriteOp::Update {
                        document: make_product(i, 9),
                        expected_version: Version::first(),
                    })
                    .collect();
                store.write_batch(ops).await.unwrap();
            });
        });
    });
}

fn bench_find_filtered(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let store = InMemoryDocumentStore::new();
    rt.block_on(async {
        for i in 0..1000 {
            store
                .insert(Document::new(
                    "ledger_entries",
                    format!("entry-{i}"),
                    serde_json::json!({"entry_type": "order_payment", "order_id": format!("o-{}", i % 100)}),
                ))
                .await
                .unwrap();
        }
    });

    c.bench_function("document_store/find_filtered_1000", |b| {
        b.iter(|| {
            rt.block_on(async {
                store
                    .find(
                        DocumentQuery::collection("ledger_entries")
                            .eq("entry_type", "order_payment")
                            .eq("order_id", "o-42"),
                    )
                    .await
                    .unwrap();
            });
        });
    });
}

criterion_group!(
    benches,
    bench_insert_single,
    bench_batch_update_10,
    bench_find_filtered
);
criterion_main!(benches);
