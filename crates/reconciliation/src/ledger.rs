//! Ledger poster: append-only creation and reversal of ledger entries.

use chrono::Utc;
use common::{CorrelationRef, EntityId};
use document_store::{DocumentQuery, DocumentStore, StoreError};
use domain::{
    DomainError, Entity, LedgerEntry, LedgerEntryStatus, LedgerEntryType, NewLedgerEntry,
    Repository,
};

use crate::error::{ReconcileError, Result};
use crate::settings::LedgerSettings;

/// Result of a post that was not skipped by settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostResult {
    /// A new entry was inserted.
    Created(EntityId),

    /// An entry for the same key or natural key already existed.
    Existing(EntityId),
}

impl PostResult {
    pub fn id(&self) -> EntityId {
        match self {
            PostResult::Created(id) | PostResult::Existing(id) => *id,
        }
    }

    pub fn is_created(&self) -> bool {
        matches!(self, PostResult::Created(_))
    }
}

/// Filter for listing entries. Unset fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LedgerFilter {
    pub order_id: Option<EntityId>,
    pub booking_id: Option<EntityId>,
    pub payment_ref: Option<CorrelationRef>,
    pub limit: Option<usize>,
}

impl LedgerFilter {
    fn into_query(self) -> DocumentQuery {
        let mut query = DocumentQuery::collection(LedgerEntry::COLLECTION);
        if let Some(id) = self.order_id {
            query = query.eq("order_id", id.to_string());
        }
        if let Some(id) = self.booking_id {
            query = query.eq("booking_id", id.to_string());
        }
        if let Some(reference) = self.payment_ref {
            query = query.eq("payment_ref", reference.as_str());
        }
        if let Some(limit) = self.limit {
            query = query.limit(limit);
        }
        query
    }
}

/// Creates and reverses ledger entries.
#[derive(Clone)]
pub struct LedgerPoster<S> {
    entries: Repository<S, LedgerEntry>,
}

impl<S> LedgerPoster<S>
where
    S: DocumentStore,
{
    /// Creates a new poster over the given store.
    pub fn new(store: S) -> Self {
        Self {
            entries: Repository::new(store),
        }
    }

    /// Posts an entry unless one already exists for the same key.
    ///
    /// Returns `None` without writing when automatic posting is switched
    /// off; callers must not treat that as an error. With `idempotency_key`
    /// the entry id is derived from the key, so concurrent first posts
    /// collide on insert and exactly one wins. Without a key, an existing
    /// confirmed entry of the same type for the same order or booking is
    /// looked up first. That check is best-effort.
    #[tracing::instrument(skip(self, draft, settings), fields(entry_type = %draft.entry_type))]
    pub async fn post(
        &self,
        draft: NewLedgerEntry,
        idempotency_key: Option<&str>,
        settings: &LedgerSettings,
    ) -> Result<Option<PostResult>> {
        if !settings.auto_posting() {
            tracing::debug!(
                enabled = settings.enabled,
                manual = settings.manual_generation,
                "ledger posting switched off, skipping"
            );
            return Ok(None);
        }
        self.create(draft, idempotency_key).await.map(Some)
    }

    /// Posts an entry regardless of the automatic posting switches.
    ///
    /// Used for entries staff create by hand.
    pub async fn post_manual(
        &self,
        draft: NewLedgerEntry,
        idempotency_key: Option<&str>,
    ) -> Result<PostResult> {
        self.create(draft, idempotency_key).await
    }

    async fn create(
        &self,
        draft: NewLedgerEntry,
        idempotency_key: Option<&str>,
    ) -> Result<PostResult> {
        validate_draft(&draft)?;

        match idempotency_key {
            Some(key) => {
                let id = LedgerEntry::id_for_key(key);
                if self.entries.get(&id.to_string()).await?.is_some() {
                    tracing::debug!(%id, "ledger entry already posted for key");
                    return Ok(PostResult::Existing(id));
                }
            }
            None => {
                if let Some(existing) = self.find_natural(&draft).await? {
                    tracing::debug!(id = %existing.id(), "ledger entry already posted for record");
                    return Ok(PostResult::Existing(existing.id()));
                }
            }
        }

        let entry_type = draft.entry_type;
        let mut entry = LedgerEntry::from_draft(
            draft,
            idempotency_key.map(str::to_string),
            Utc::now(),
        );
        match self.entries.insert(&mut entry).await {
            Ok(()) => {
                metrics::counter!("ledger_entries_posted_total", "entry_type" => entry_type.as_str())
                    .increment(1);
                tracing::info!(id = %entry.id(), amount = %entry.amount(), "ledger entry posted");
                Ok(PostResult::Created(entry.id()))
            }
            Err(DomainError::Store(StoreError::DuplicateDocument { .. })) => {
                tracing::debug!(id = %entry.id(), "lost race to post ledger entry");
                Ok(PostResult::Existing(entry.id()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn find_natural(&self, draft: &NewLedgerEntry) -> Result<Option<LedgerEntry>> {
        let query = Repository::<S, LedgerEntry>::query()
            .eq("entry_type", draft.entry_type.as_str())
            .eq("status", "confirmed");
        let query = match (draft.order_id, draft.booking_id) {
            (Some(order_id), _) => query.eq("order_id", order_id.to_string()),
            (None, Some(booking_id)) => query.eq("booking_id", booking_id.to_string()),
            (None, None) => return Ok(None),
        };
        Ok(self.entries.find_one(query).await?)
    }

    /// Posts the reversal of an entry and returns the reversal's id.
    ///
    /// The original is never modified. An entry can be reversed once, and a
    /// reversal cannot itself be reversed.
    #[tracing::instrument(skip(self, reason))]
    pub async fn reverse(&self, entry_id: EntityId, reason: &str, actor: &str) -> Result<EntityId> {
        let original = self.entries.require(&entry_id.to_string()).await?;
        if original.is_reversal() {
            return Err(ReconcileError::ReversalOfReversal(entry_id));
        }

        let mut reversal = LedgerEntry::reversal_of(&original, reason, actor, Utc::now());
        match self.entries.insert(&mut reversal).await {
            Ok(()) => {
                metrics::counter!("ledger_entries_posted_total", "entry_type" => "reversal")
                    .increment(1);
                tracing::info!(reversal_id = %reversal.id(), "ledger entry reversed");
                Ok(reversal.id())
            }
            Err(DomainError::Store(StoreError::DuplicateDocument { .. })) => {
                Err(ReconcileError::AlreadyReversed(entry_id))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Loads one entry.
    pub async fn get(&self, entry_id: EntityId) -> Result<Option<LedgerEntry>> {
        Ok(self.entries.get(&entry_id.to_string()).await?)
    }

    /// Lists entries matching a filter, oldest first.
    pub async fn entries(&self, filter: LedgerFilter) -> Result<Vec<LedgerEntry>> {
        Ok(self.entries.find(filter.into_query()).await?)
    }

    pub async fn for_order(&self, order_id: EntityId) -> Result<Vec<LedgerEntry>> {
        self.entries(LedgerFilter {
            order_id: Some(order_id),
            ..Default::default()
        })
        .await
    }

    pub async fn for_booking(&self, booking_id: EntityId) -> Result<Vec<LedgerEntry>> {
        self.entries(LedgerFilter {
            booking_id: Some(booking_id),
            ..Default::default()
        })
        .await
    }

    pub async fn for_payment_ref(&self, reference: &CorrelationRef) -> Result<Vec<LedgerEntry>> {
        self.entries(LedgerFilter {
            payment_ref: Some(reference.clone()),
            ..Default::default()
        })
        .await
    }

    /// Returns confirmed payment entries of a record that have no reversal yet.
    pub async fn unreversed_payments(
        &self,
        entry_type: LedgerEntryType,
        filter: LedgerFilter,
    ) -> Result<Vec<LedgerEntry>> {
        let entries = self.entries(filter).await?;
        let reversed: Vec<EntityId> = entries
            .iter()
            .filter_map(LedgerEntry::reversed_entry_id)
            .collect();
        Ok(entries
            .into_iter()
            .filter(|e| {
                e.entry_type() == entry_type
                    && e.status() == LedgerEntryStatus::Confirmed
                    && !reversed.contains(&e.id())
            })
            .collect())
    }
}

fn validate_draft(draft: &NewLedgerEntry) -> Result<()> {
    if draft.order_id.is_some() && draft.booking_id.is_some() {
        return Err(ReconcileError::Validation(
            "a ledger entry links to an order or a booking, not both".to_string(),
        ));
    }
    if draft.amount.is_zero() {
        return Err(ReconcileError::Validation(
            "ledger entry amount must not be zero".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use document_store::InMemoryDocumentStore;
    use domain::{Currency, Money, PurchaseKind};

    fn payment(order_id: EntityId, reference: &str) -> NewLedgerEntry {
        NewLedgerEntry::payment(
            PurchaseKind::Order,
            order_id,
            Money::from_cents(250_000),
            Currency::parse("NGN").unwrap(),
            CorrelationRef::parse(reference).unwrap(),
        )
    }

    #[tokio::test]
    async fn test_keyed_post_is_idempotent() {
        let store = InMemoryDocumentStore::new();
        let poster = LedgerPoster::new(store.clone());
        let order_id = EntityId::new();
        let settings = LedgerSettings::default();

        let first = poster
            .post(payment(order_id, "ORD-1"), Some("ORD-1"), &settings)
            .await
            .unwrap()
            .unwrap();
        let second = poster
            .post(payment(order_id, "ORD-1"), Some("ORD-1"), &settings)
            .await
            .unwrap()
            .unwrap();

        assert!(first.is_created());
        assert_eq!(second, PostResult::Existing(first.id()));
        assert_eq!(store.count("ledger_entries").await, 1);
    }

    #[tokio::test]
    async fn test_unkeyed_post_uses_natural_key() {
        let store = InMemoryDocumentStore::new();
        let poster = LedgerPoster::new(store.clone());
        let order_id = EntityId::new();
        let settings = LedgerSettings::default();

        let first = poster
            .post(payment(order_id, "ORD-1"), None, &settings)
            .await
            .unwrap()
            .unwrap();
        let second = poster
            .post(payment(order_id, "ORD-1"), None, &settings)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(second, PostResult::Existing(first.id()));

        poster
            .post(payment(EntityId::new(), "ORD-2"), None, &settings)
            .await
            .unwrap();
        assert_eq!(store.count("ledger_entries").await, 2);
    }

    #[tokio::test]
    async fn test_disabled_or_manual_mode_skips() {
        let store = InMemoryDocumentStore::new();
        let poster = LedgerPoster::new(store.clone());

        let disabled = LedgerSettings {
            enabled: false,
            manual_generation: false,
        };
        let manual = LedgerSettings {
            enabled: true,
            manual_generation: true,
        };
        assert!(
            poster
                .post(payment(EntityId::new(), "ORD-1"), Some("ORD-1"), &disabled)
                .await
                .unwrap()
                .is_none()
        );
        assert!(
            poster
                .post(payment(EntityId::new(), "ORD-1"), Some("ORD-1"), &manual)
                .await
                .unwrap()
                .is_none()
        );
        assert_eq!(store.count("ledger_entries").await, 0);

        let created = poster
            .post_manual(payment(EntityId::new(), "ORD-1"), None)
            .await
            .unwrap();
        assert!(created.is_created());
    }

    #[tokio::test]
    async fn test_reverse_leaves_original_untouched() {
        let store = InMemoryDocumentStore::new();
        let poster = LedgerPoster::new(store.clone());
        let order_id = EntityId::new();
        let posted = poster
            .post(payment(order_id, "ORD-1"), Some("ORD-1"), &LedgerSettings::default())
            .await
            .unwrap()
            .unwrap();
        let before = poster.get(posted.id()).await.unwrap().unwrap();

        let reversal_id = poster
            .reverse(posted.id(), "customer refund", "staff@shop")
            .await
            .unwrap();

        let after = poster.get(posted.id()).await.unwrap().unwrap();
        assert_eq!(before, after);

        let reversal = poster.get(reversal_id).await.unwrap().unwrap();
        assert_eq!(reversal.amount(), before.amount().negate());
        assert_eq!(reversal.status(), LedgerEntryStatus::Reversed);
        assert_eq!(reversal.reversed_entry_id(), Some(posted.id()));
        assert_eq!(reversal.order_id(), Some(order_id));
    }

    #[tokio::test]
    async fn test_reverse_rules() {
        let store = InMemoryDocumentStore::new();
        let poster = LedgerPoster::new(store);
        let posted = poster
            .post_manual(payment(EntityId::new(), "ORD-1"), None)
            .await
            .unwrap();

        let reversal_id = poster.reverse(posted.id(), "refund", "staff").await.unwrap();
        assert!(matches!(
            poster.reverse(posted.id(), "again", "staff").await,
            Err(ReconcileError::AlreadyReversed(_))
        ));
        assert!(matches!(
            poster.reverse(reversal_id, "undo", "staff").await,
            Err(ReconcileError::ReversalOfReversal(_))
        ));
        assert!(matches!(
            poster.reverse(EntityId::new(), "missing", "staff").await,
            Err(ReconcileError::Domain(DomainError::NotFound { .. }))
        ));
    }

    #[tokio::test]
    async fn test_queries_and_unreversed_payments() {
        let store = InMemoryDocumentStore::new();
        let poster = LedgerPoster::new(store);
        let order_id = EntityId::new();
        let posted = poster
            .post(payment(order_id, "ORD-9"), Some("ORD-9"), &LedgerSettings::default())
            .await
            .unwrap()
            .unwrap();

        let reference = CorrelationRef::parse("ORD-9").unwrap();
        assert_eq!(poster.for_order(order_id).await.unwrap().len(), 1);
        assert_eq!(poster.for_payment_ref(&reference).await.unwrap().len(), 1);
        assert!(poster.for_booking(order_id).await.unwrap().is_empty());

        let filter = LedgerFilter {
            order_id: Some(order_id),
            ..Default::default()
        };
        let open = poster
            .unreversed_payments(LedgerEntryType::OrderPayment, filter.clone())
            .await
            .unwrap();
        assert_eq!(open.len(), 1);

        poster.reverse(posted.id(), "refund", "staff").await.unwrap();
        assert_eq!(poster.for_order(order_id).await.unwrap().len(), 2);
        assert!(
            poster
                .unreversed_payments(LedgerEntryType::OrderPayment, filter)
                .await
                .unwrap()
                .is_empty()
        );
    }

    #[tokio::test]
    async fn test_zero_amount_rejected() {
        let poster = LedgerPoster::new(InMemoryDocumentStore::new());
        let mut draft = payment(EntityId::new(), "ORD-1");
        draft.amount = Money::zero();
        assert!(matches!(
            poster.post_manual(draft, None).await,
            Err(ReconcileError::Validation(_))
        ));
    }
}
