use std::collections::HashSet;

use async_trait::async_trait;

use crate::{Document, DocumentQuery, Result, StoreError, Version};

/// A single write inside a batch.
#[derive(Debug, Clone)]
pub enum WriteOp {
    /// Insert a new document; fails if the id already exists.
    Insert(Document),

    /// Replace an existing document if it is still at `expected_version`.
    Update {
        document: Document,
        expected_version: Version,
    },
}

impl WriteOp {
    /// Creates an update op expecting the version carried by the document.
    pub fn update(document: Document) -> Self {
        let expected_version = document.version;
        WriteOp::Update {
            document,
            expected_version,
        }
    }

    /// Returns the document being written.
    pub fn document(&self) -> &Document {
        match self {
            WriteOp::Insert(doc) => doc,
            WriteOp::Update { document, .. } => document,
        }
    }
}

/// Core trait for document store implementations.
///
/// All implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Loads a document by collection and id.
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>>;

    /// Returns the documents matching a query.
    async fn find(&self, query: DocumentQuery) -> Result<Vec<Document>>;

    /// Applies a batch of writes atomically.
    ///
    /// Either every op is applied or none is. Returns the new version of each
    /// document, in op order.
    async fn write_batch(&self, ops: Vec<WriteOp>) -> Result<Vec<Version>>;
}

/// Extension trait providing convenience methods for document stores.
#[async_trait]
pub trait DocumentStoreExt: DocumentStore {
    /// Inserts a single new document.
    async fn insert(&self, document: Document) -> Result<Version> {
        single(self.write_batch(vec![WriteOp::Insert(document)]).await?)
    }

    /// Updates a single document with an optimistic version check.
    async fn update(&self, document: Document, expected_version: Version) -> Result<Version> {
        single(
            self.write_batch(vec![WriteOp::Update {
                document,
                expected_version,
            }])
            .await?,
        )
    }

    /// Returns the first document matching a query.
    async fn find_one(&self, query: DocumentQuery) -> Result<Option<Document>> {
        Ok(self.find(query.limit(1)).await?.into_iter().next())
    }

    /// Checks whether a document exists.
    async fn exists(&self, collection: &str, id: &str) -> Result<bool> {
        Ok(self.get(collection, id).await?.is_some())
    }
}

// Blanket implementation for all DocumentStore implementations
impl<T: DocumentStore + ?Sized> DocumentStoreExt for T {}

fn single(versions: Vec<Version>) -> Result<Version> {
    versions
        .into_iter()
        .next()
        .ok_or_else(|| StoreError::InvalidBatch("store returned no version".to_string()))
}

/// Validates a batch before any write is attempted.
///
/// A batch must be non-empty and may touch each document at most once.
pub fn validate_batch(ops: &[WriteOp]) -> Result<()> {
    if ops.is_empty() {
        return Err(StoreError::InvalidBatch(
            "Cannot write an empty batch".to_string(),
        ));
    }

    let mut seen = HashSet::with_capacity(ops.len());
    for op in ops {
        let doc = op.document();
        if doc.collection.is_empty() || doc.id.is_empty() {
            return Err(StoreError::InvalidBatch(
                "Documents must have a collection and an id".to_string(),
            ));
        }
        if !seen.insert(doc.key()) {
            return Err(StoreError::InvalidBatch(format!(
                "Document {}/{} appears more than once in the batch",
                doc.collection, doc.id
            )));
        }
    }

    Ok(())
}
