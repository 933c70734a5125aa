use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use crate::{
    Document, DocumentQuery, Result, StoreError, Version,
    store::{DocumentStore, WriteOp, validate_batch},
};

type Key = (String, String);

/// In-memory document store.
///
/// Provides the same interface and atomicity guarantees as the PostgreSQL
/// implementation. A batch holds the write lock for its whole duration, so
/// concurrent readers never observe a partially applied batch.
#[derive(Clone, Default)]
pub struct InMemoryDocumentStore {
    documents: Arc<RwLock<HashMap<Key, Document>>>,
    failing_collections: Arc<std::sync::RwLock<HashSet<String>>>,
}

impl InMemoryDocumentStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of documents in a collection.
    pub async fn count(&self, collection: &str) -> usize {
        self.documents
            .read()
            .await
            .keys()
            .filter(|(c, _)| c == collection)
            .count()
    }

    /// Clears all documents.
    pub async fn clear(&self) {
        self.documents.write().await.clear();
    }

    /// Makes every batch touching `collection` fail with `Unavailable`.
    pub fn fail_writes_to(&self, collection: &str) {
        if let Ok(mut failing) = self.failing_collections.write() {
            failing.insert(collection.to_string());
        }
    }

    /// Removes all injected write failures.
    pub fn clear_write_failures(&self) {
        if let Ok(mut failing) = self.failing_collections.write() {
            failing.clear();
        }
    }

    fn check_injected_failure(&self, ops: &[WriteOp]) -> Result<()> {
        let failing = self
            .failing_collections
            .read()
            .map_err(|_| StoreError::Unavailable("failure registry poisoned".to_string()))?;
        if let Some(op) = ops
            .iter()
            .find(|op| failing.contains(&op.document().collection))
        {
            return Err(StoreError::Unavailable(format!(
                "writes to {} are failing",
                op.document().collection
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>> {
        let store = self.documents.read().await;
        Ok(store
            .get(&(collection.to_string(), id.to_string()))
            .cloned())
    }

    async fn find(&self, query: DocumentQuery) -> Result<Vec<Document>> {
        let store = self.documents.read().await;
        let mut docs: Vec<_> = store
            .values()
            .filter(|d| d.collection == query.collection && query.matches(&d.body))
            .cloned()
            .collect();

        docs.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));

        // Apply offset and limit
        let offset = query.offset.unwrap_or(0);
        let docs = docs.into_iter().skip(offset);
        let docs = match query.limit {
            Some(limit) => docs.take(limit).collect(),
            None => docs.collect(),
        };

        Ok(docs)
    }

    async fn write_batch(&self, ops: Vec<WriteOp>) -> Result<Vec<Version>> {
        validate_batch(&ops)?;
        self.check_injected_failure(&ops)?;

        let mut store = self.documents.write().await;

        // Check every precondition before touching anything
        for op in &ops {
            let doc = op.document();
            let key = (doc.collection.clone(), doc.id.clone());
            match op {
                WriteOp::Insert(_) => {
                    if store.contains_key(&key) {
                        return Err(StoreError::DuplicateDocument {
                            collection: doc.collection.clone(),
                            id: doc.id.clone(),
                        });
                    }
                }
                WriteOp::Update {
                    expected_version, ..
                } => {
                    let actual = store
                        .get(&key)
                        .map(|d| d.version)
                        .unwrap_or(Version::initial());
                    if actual != *expected_version {
                        return Err(StoreError::ConcurrencyConflict {
                            collection: doc.collection.clone(),
                            id: doc.id.clone(),
                            expected: *expected_version,
                            actual,
                        });
                    }
                }
            }
        }

        let now = Utc::now();
        let mut versions = Vec::with_capacity(ops.len());
        for op in ops {
            let (mut doc, created_at) = match op {
                WriteOp::Insert(doc) => (doc, now),
                WriteOp::Update { document, .. } => {
                    let key = (document.collection.clone(), document.id.clone());
                    let created_at = store.get(&key).map(|d| d.created_at).unwrap_or(now);
                    (document, created_at)
                }
            };
            let key = (doc.collection.clone(), doc.id.clone());
            let version = store
                .get(&key)
                .map(|d| d.version)
                .unwrap_or(Version::initial())
                .next();
            doc.version = version;
            doc.created_at = created_at;
            doc.updated_at = now;
            store.insert(key, doc);
            versions.push(version);
        }

        metrics::counter!("document_store_batches_total").increment(1);
        Ok(versions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::DocumentStoreExt;
    use serde_json::json;

    fn product(id: &str, quantity: i64) -> Document {
        Document::new("products", id, json!({"quantity": quantity}))
    }

    #[tokio::test]
    async fn insert_assigns_first_version() {
        let store = InMemoryDocumentStore::new();
        let version = store.insert(product("SKU-1", 5)).await.unwrap();
        assert_eq!(version, Version::first());

        let doc = store.get("products", "SKU-1").await.unwrap().unwrap();
        assert_eq!(doc.version, Version::first());
        assert_eq!(doc.body["quantity"], 5);
    }

    #[tokio::test]
    async fn duplicate_insert_is_rejected() {
        let store = InMemoryDocumentStore::new();
        store.insert(product("SKU-1", 5)).await.unwrap();

        let result = store.insert(product("SKU-1", 9)).await;
        assert!(matches!(result, Err(StoreError::DuplicateDocument { .. })));

        let doc = store.get("products", "SKU-1").await.unwrap().unwrap();
        assert_eq!(doc.body["quantity"], 5);
    }

    #[tokio::test]
    async fn update_with_stale_version_conflicts() {
        let store = InMemoryDocumentStore::new();
        store.insert(product("SKU-1", 5)).await.unwrap();

        store
            .update(product("SKU-1", 4), Version::first())
            .await
            .unwrap();

        let result = store.update(product("SKU-1", 3), Version::first()).await;
        assert!(matches!(
            result,
            Err(StoreError::ConcurrencyConflict { actual, .. }) if actual == Version::new(2)
        ));
    }

    #[tokio::test]
    async fn update_preserves_created_at() {
        let store = InMemoryDocumentStore::new();
        store.insert(product("SKU-1", 5)).await.unwrap();
        let before = store.get("products", "SKU-1").await.unwrap().unwrap();

        store
            .update(product("SKU-1", 4), Version::first())
            .await
            .unwrap();
        let after = store.get("products", "SKU-1").await.unwrap().unwrap();

        assert_eq!(after.created_at, before.created_at);
        assert!(after.updated_at >= before.updated_at);
        assert_eq!(after.version, Version::new(2));
    }

    #[tokio::test]
    async fn update_of_missing_document_conflicts() {
        let store = InMemoryDocumentStore::new();
        let result = store.update(product("SKU-9", 1), Version::first()).await;
        assert!(matches!(
            result,
            Err(StoreError::ConcurrencyConflict { actual, .. }) if actual == Version::initial()
        ));
    }

    #[tokio::test]
    async fn batch_is_all_or_nothing() {
        let store = InMemoryDocumentStore::new();
        store.insert(product("SKU-1", 5)).await.unwrap();
        store.insert(product("SKU-2", 5)).await.unwrap();

        // Second op carries a stale version, so the first must not be applied either
        let ops = vec![
            WriteOp::Update {
                document: product("SKU-1", 3),
                expected_version: Version::first(),
            },
            WriteOp::Update {
                document: product("SKU-2", 3),
                expected_version: Version::new(7),
            },
        ];
        assert!(store.write_batch(ops).await.is_err());

        let sku1 = store.get("products", "SKU-1").await.unwrap().unwrap();
        assert_eq!(sku1.body["quantity"], 5);
        assert_eq!(sku1.version, Version::first());
    }

    #[tokio::test]
    async fn batch_returns_versions_in_op_order() {
        let store = InMemoryDocumentStore::new();
        store.insert(product("SKU-1", 5)).await.unwrap();

        let versions = store
            .write_batch(vec![
                WriteOp::Update {
                    document: product("SKU-1", 4),
                    expected_version: Version::first(),
                },
                WriteOp::Insert(product("SKU-2", 1)),
            ])
            .await
            .unwrap();

        assert_eq!(versions, vec![Version::new(2), Version::first()]);
    }

    #[tokio::test]
    async fn find_filters_and_paginates() {
        let store = InMemoryDocumentStore::new();
        for (id, status) in [("a", "paid"), ("b", "pending"), ("c", "paid"), ("d", "paid")] {
            store
                .insert(Document::new("orders", id, json!({"status": status})))
                .await
                .unwrap();
        }

        let paid = store
            .find(DocumentQuery::collection("orders").eq("status", "paid"))
            .await
            .unwrap();
        assert_eq!(paid.len(), 3);

        let page = store
            .find(
                DocumentQuery::collection("orders")
                    .eq("status", "paid")
                    .offset(1)
                    .limit(1),
            )
            .await
            .unwrap();
        assert_eq!(page.len(), 1);

        let none = store
            .find(DocumentQuery::collection("bookings"))
            .await
            .unwrap();
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn injected_failure_blocks_whole_batch() {
        let store = InMemoryDocumentStore::new();
        store.fail_writes_to("ledger_entries");

        let ops = vec![
            WriteOp::Insert(product("SKU-1", 5)),
            WriteOp::Insert(Document::new("ledger_entries", "e-1", json!({}))),
        ];
        assert!(matches!(
            store.write_batch(ops).await,
            Err(StoreError::Unavailable(_))
        ));
        assert_eq!(store.count("products").await, 0);

        store.clear_write_failures();
        store.insert(product("SKU-1", 5)).await.unwrap();
        assert_eq!(store.count("products").await, 1);
    }

    #[tokio::test]
    async fn concurrent_inserts_of_same_id_admit_exactly_one() {
        let store = InMemoryDocumentStore::new();
        let mut handles = Vec::new();
        for n in 0..10 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store
                    .insert(Document::new("ledger_entries", "key-1", json!({"n": n})))
                    .await
            }));
        }

        let mut ok = 0;
        for handle in handles {
            if handle.await.unwrap().is_ok() {
                ok += 1;
            }
        }
        assert_eq!(ok, 1);
        assert_eq!(store.count("ledger_entries").await, 1);
    }
}
