//! Typed access to entities stored in a document store.

use std::marker::PhantomData;

use document_store::{
    Document, DocumentQuery, DocumentStore, StoreError, Version, WriteOp,
};

use crate::entity::Entity;
use crate::error::DomainError;

/// How many times a read-modify-write is re-attempted after losing a race.
pub const MAX_CONFLICT_RETRIES: usize = 5;

/// Decision returned by an update closure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation<T> {
    /// The entity was modified and must be written back.
    Changed(T),

    /// Nothing to write; the entity is returned as loaded.
    Unchanged(T),
}

/// Result of a read-modify-write.
#[derive(Debug, Clone)]
pub struct UpdateResult<E, T> {
    /// The entity as it now stands in the store.
    pub entity: E,

    /// Value returned by the update closure.
    pub outcome: T,

    /// Whether a write was performed.
    pub written: bool,
}

/// Loads and saves one entity type.
///
/// Every write is guarded by the version the entity was loaded at, so a
/// writer that lost a race gets `ConcurrencyConflict` instead of silently
/// overwriting the winner.
pub struct Repository<S, E> {
    store: S,
    _entity: PhantomData<fn() -> E>,
}

impl<S: Clone, E> Clone for Repository<S, E> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            _entity: PhantomData,
        }
    }
}

impl<S, E> Repository<S, E>
where
    S: DocumentStore,
    E: Entity,
{
    /// Creates a new repository over the given store.
    pub fn new(store: S) -> Self {
        Self {
            store,
            _entity: PhantomData,
        }
    }

    /// Returns a reference to the underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Starts a query over this entity's collection.
    pub fn query() -> DocumentQuery {
        DocumentQuery::collection(E::COLLECTION)
    }

    /// Decodes a stored document, restoring its version.
    pub fn decode(document: &Document) -> Result<E, DomainError> {
        let mut entity: E = document.decode()?;
        entity.set_version(document.version);
        Ok(entity)
    }

    /// Builds an insert op for a new entity.
    pub fn insert_op(entity: &E) -> Result<WriteOp, DomainError> {
        Ok(WriteOp::Insert(Document::from_value(
            E::COLLECTION,
            entity.document_id(),
            entity,
        )?))
    }

    /// Builds an update op guarded by the entity's loaded version.
    pub fn update_op(entity: &E) -> Result<WriteOp, DomainError> {
        Ok(WriteOp::Update {
            document: Document::from_value(E::COLLECTION, entity.document_id(), entity)?,
            expected_version: entity.version(),
        })
    }

    /// Loads an entity, returning None if it doesn't exist.
    pub async fn get(&self, id: &str) -> Result<Option<E>, DomainError> {
        self.store
            .get(E::COLLECTION, id)
            .await?
            .map(|doc| Self::decode(&doc))
            .transpose()
    }

    /// Loads an entity, failing with `NotFound` if it doesn't exist.
    pub async fn require(&self, id: &str) -> Result<E, DomainError> {
        self.get(id).await?.ok_or_else(|| DomainError::NotFound {
            collection: E::COLLECTION,
            id: id.to_string(),
        })
    }

    /// Returns every entity matching a query.
    pub async fn find(&self, query: DocumentQuery) -> Result<Vec<E>, DomainError> {
        self.store
            .find(query)
            .await?
            .iter()
            .map(Self::decode)
            .collect()
    }

    /// Returns the first entity matching a query.
    pub async fn find_one(&self, query: DocumentQuery) -> Result<Option<E>, DomainError> {
        Ok(self.find(query.limit(1)).await?.into_iter().next())
    }

    /// Inserts a new entity and records its first version.
    pub async fn insert(&self, entity: &mut E) -> Result<(), DomainError> {
        let versions = self.store.write_batch(vec![Self::insert_op(entity)?]).await?;
        entity.set_version(versions.first().copied().unwrap_or(Version::first()));
        Ok(())
    }

    /// Writes back a loaded entity if nobody else wrote it in between.
    pub async fn save(&self, entity: &mut E) -> Result<(), DomainError> {
        let versions = self.store.write_batch(vec![Self::update_op(entity)?]).await?;
        let next = entity.version().next();
        entity.set_version(versions.first().copied().unwrap_or(next));
        Ok(())
    }

    /// Loads an entity, lets `decide` modify it, and writes it back.
    ///
    /// On a concurrency conflict the entity is re-read and `decide` runs
    /// again against the fresh state, up to [`MAX_CONFLICT_RETRIES`] times.
    /// Errors returned by `decide` abort without writing.
    pub async fn update_with<T, F>(
        &self,
        id: &str,
        mut decide: F,
    ) -> Result<UpdateResult<E, T>, DomainError>
    where
        F: FnMut(&mut E) -> Result<Mutation<T>, DomainError>,
    {
        let mut attempt = 0;
        loop {
            let loaded = self.require(id).await?;
            let mut working = loaded.clone();

            match decide(&mut working)? {
                Mutation::Unchanged(outcome) => {
                    return Ok(UpdateResult {
                        entity: loaded,
                        outcome,
                        written: false,
                    });
                }
                Mutation::Changed(outcome) => match self.save(&mut working).await {
                    Ok(()) => {
                        return Ok(UpdateResult {
                            entity: working,
                            outcome,
                            written: true,
                        });
                    }
                    Err(DomainError::Store(err @ StoreError::ConcurrencyConflict { .. })) => {
                        attempt += 1;
                        if attempt > MAX_CONFLICT_RETRIES {
                            return Err(DomainError::Store(err));
                        }
                        tracing::debug!(
                            collection = E::COLLECTION,
                            id,
                            attempt,
                            "concurrent write detected, retrying"
                        );
                    }
                    Err(err) => return Err(err),
                },
            }
        }
    }
}
