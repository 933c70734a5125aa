use async_trait::async_trait;
use chrono::Utc;
use sqlx::{PgPool, Row, postgres::PgRow};

use crate::{
    Document, DocumentQuery, Result, StoreError, Version,
    store::{DocumentStore, WriteOp, validate_batch},
};

/// PostgreSQL-backed document store.
///
/// All collections share one `documents` table keyed by `(collection, id)`
/// with a JSONB body. A batch runs inside a single SQL transaction.
#[derive(Clone)]
pub struct PostgresDocumentStore {
    pool: PgPool,
}

impl PostgresDocumentStore {
    /// Creates a new PostgreSQL document store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> std::result::Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("../../migrations").run(&self.pool).await
    }

    fn row_to_document(row: PgRow) -> Result<Document> {
        Ok(Document {
            collection: row.try_get("collection")?,
            id: row.try_get("id")?,
            version: Version::new(row.try_get("version")?),
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
            body: row.try_get("body")?,
        })
    }
}

#[async_trait]
impl DocumentStore for PostgresDocumentStore {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>> {
        let row: Option<PgRow> = sqlx::query(
            r#"
            SELECT collection, id, version, created_at, updated_at, body
            FROM documents
            WHERE collection = $1 AND id = $2
            "#,
        )
        .bind(collection)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_document).transpose()
    }

    async fn find(&self, query: DocumentQuery) -> Result<Vec<Document>> {
        let mut sql = String::from(
            "SELECT collection, id, version, created_at, updated_at, body FROM documents WHERE collection = $1",
        );
        let mut param_count = 1;

        if !query.filters.is_empty() {
            param_count += 1;
            sql.push_str(&format!(" AND body @> ${param_count}"));
        }

        sql.push_str(" ORDER BY created_at ASC, id ASC");

        if query.limit.is_some() {
            param_count += 1;
            sql.push_str(&format!(" LIMIT ${param_count}"));
        }
        if query.offset.is_some() {
            param_count += 1;
            sql.push_str(&format!(" OFFSET ${param_count}"));
        }

        let mut sqlx_query = sqlx::query(&sql).bind(&query.collection);

        if !query.filters.is_empty() {
            sqlx_query = sqlx_query.bind(query.containment_filter());
        }
        if let Some(limit) = query.limit {
            sqlx_query = sqlx_query.bind(limit as i64);
        }
        if let Some(offset) = query.offset {
            sqlx_query = sqlx_query.bind(offset as i64);
        }

        let rows = sqlx_query.fetch_all(&self.pool).await?;
        rows.into_iter().map(Self::row_to_document).collect()
    }

    async fn write_batch(&self, ops: Vec<WriteOp>) -> Result<Vec<Version>> {
        validate_batch(&ops)?;

        // Dropping the transaction on an early return rolls it back
        let mut tx = self.pool.begin().await?;
        let now = Utc::now();
        let mut versions = Vec::with_capacity(ops.len());

        for op in &ops {
            match op {
                WriteOp::Insert(doc) => {
                    let result = sqlx::query(
                        r#"
                        INSERT INTO documents (collection, id, version, created_at, updated_at, body)
                        VALUES ($1, $2, 1, $3, $3, $4)
                        ON CONFLICT (collection, id) DO NOTHING
                        "#,
                    )
                    .bind(&doc.collection)
                    .bind(&doc.id)
                    .bind(now)
                    .bind(&doc.body)
                    .execute(&mut *tx)
                    .await?;

                    if result.rows_affected() == 0 {
                        return Err(StoreError::DuplicateDocument {
                            collection: doc.collection.clone(),
                            id: doc.id.clone(),
                        });
                    }
                    versions.push(Version::first());
                }
                WriteOp::Update {
                    document,
                    expected_version,
                } => {
                    let next = expected_version.next();
                    let result = sqlx::query(
                        r#"
                        UPDATE documents
                        SET version = $1, updated_at = $2, body = $3
                        WHERE collection = $4 AND id = $5 AND version = $6
                        "#,
                    )
                    .bind(next.as_i64())
                    .bind(now)
                    .bind(&document.body)
                    .bind(&document.collection)
                    .bind(&document.id)
                    .bind(expected_version.as_i64())
                    .execute(&mut *tx)
                    .await?;

                    if result.rows_affected() == 0 {
                        let actual: Option<i64> = sqlx::query_scalar(
                            "SELECT version FROM documents WHERE collection = $1 AND id = $2",
                        )
                        .bind(&document.collection)
                        .bind(&document.id)
                        .fetch_optional(&mut *tx)
                        .await?;

                        return Err(StoreError::ConcurrencyConflict {
                            collection: document.collection.clone(),
                            id: document.id.clone(),
                            expected: *expected_version,
                            actual: actual.map(Version::new).unwrap_or(Version::initial()),
                        });
                    }
                    versions.push(next);
                }
            }
        }

        tx.commit().await?;
        metrics::counter!("document_store_batches_total").increment(1);
        tracing::debug!(ops = versions.len(), "document batch committed");
        Ok(versions)
    }
}
