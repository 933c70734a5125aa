//! Append-only financial ledger entries.

use chrono::{DateTime, Utc};
use common::{CorrelationRef, EntityId};
use document_store::Version;
use serde::{Deserialize, Serialize};

use crate::entity::{Entity, collections};
use crate::money::{Currency, Money};
use crate::purchase::PurchaseKind;

/// What a ledger entry records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LedgerEntryType {
    OrderPayment,
    BookingPayment,
    Refund,
    Adjustment,
}

impl LedgerEntryType {
    /// Entry type recording a confirmed payment for `kind`.
    pub fn payment_for(kind: PurchaseKind) -> Self {
        match kind {
            PurchaseKind::Order => LedgerEntryType::OrderPayment,
            PurchaseKind::Booking => LedgerEntryType::BookingPayment,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LedgerEntryType::OrderPayment => "order_payment",
            LedgerEntryType::BookingPayment => "booking_payment",
            LedgerEntryType::Refund => "refund",
            LedgerEntryType::Adjustment => "adjustment",
        }
    }
}

impl std::fmt::Display for LedgerEntryType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether an entry is an original fact or the reversal of one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LedgerEntryStatus {
    Confirmed,
    Reversed,
}

/// Fields supplied by a caller posting a new entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewLedgerEntry {
    pub entry_type: LedgerEntryType,
    pub amount: Money,
    pub currency: Currency,
    pub order_id: Option<EntityId>,
    pub booking_id: Option<EntityId>,
    pub payment_ref: Option<CorrelationRef>,
    pub description: String,
    pub actor: String,
}

impl NewLedgerEntry {
    /// Payment entry for an order or booking.
    pub fn payment(
        kind: PurchaseKind,
        target_id: EntityId,
        amount: Money,
        currency: Currency,
        payment_ref: CorrelationRef,
    ) -> Self {
        let (order_id, booking_id) = match kind {
            PurchaseKind::Order => (Some(target_id), None),
            PurchaseKind::Booking => (None, Some(target_id)),
        };
        Self {
            entry_type: LedgerEntryType::payment_for(kind),
            amount,
            currency,
            order_id,
            booking_id,
            description: format!("Payment {payment_ref} for {kind} {target_id}"),
            payment_ref: Some(payment_ref),
            actor: "system".to_string(),
        }
    }
}

/// An immutable financial fact.
///
/// Entries are only ever inserted. A correction is a new entry with the
/// negated amount and `reversed_entry_id` pointing at the original.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    id: EntityId,

    #[serde(skip)]
    version: Version,

    entry_type: LedgerEntryType,
    status: LedgerEntryStatus,
    amount: Money,
    currency: Currency,

    #[serde(default)]
    order_id: Option<EntityId>,

    #[serde(default)]
    booking_id: Option<EntityId>,

    #[serde(default)]
    payment_ref: Option<CorrelationRef>,

    #[serde(default)]
    idempotency_key: Option<String>,

    #[serde(default)]
    reversed_entry_id: Option<EntityId>,

    description: String,
    actor: String,
    created_at: DateTime<Utc>,
}

impl LedgerEntry {
    /// Builds a confirmed entry from a caller's draft.
    ///
    /// With an idempotency key the id is derived from the key, so two
    /// concurrent posts with the same key collide on insert.
    pub fn from_draft(
        draft: NewLedgerEntry,
        idempotency_key: Option<String>,
        at: DateTime<Utc>,
    ) -> Self {
        let id = match &idempotency_key {
            Some(key) => Self::id_for_key(key),
            None => EntityId::new(),
        };
        Self {
            id,
            version: Version::initial(),
            entry_type: draft.entry_type,
            status: LedgerEntryStatus::Confirmed,
            amount: draft.amount,
            currency: draft.currency,
            order_id: draft.order_id,
            booking_id: draft.booking_id,
            payment_ref: draft.payment_ref,
            idempotency_key,
            reversed_entry_id: None,
            description: draft.description,
            actor: draft.actor,
            created_at: at,
        }
    }

    /// Builds the reversal of `original`. The original is not touched.
    ///
    /// The reversal id is derived from the original's, so an entry can be
    /// reversed at most once.
    pub fn reversal_of(original: &LedgerEntry, reason: &str, actor: &str, at: DateTime<Utc>) -> Self {
        Self {
            id: Self::reversal_id_for(original.id),
            version: Version::initial(),
            entry_type: original.entry_type,
            status: LedgerEntryStatus::Reversed,
            amount: original.amount.negate(),
            currency: original.currency.clone(),
            order_id: original.order_id,
            booking_id: original.booking_id,
            payment_ref: original.payment_ref.clone(),
            idempotency_key: None,
            reversed_entry_id: Some(original.id),
            description: format!("Reversal of {}: {reason}", original.id),
            actor: actor.to_string(),
            created_at: at,
        }
    }

    /// Entry id used for a given idempotency key.
    pub fn id_for_key(key: &str) -> EntityId {
        EntityId::derived(&format!("ledger:{key}"))
    }

    /// Id the reversal of `original` will carry.
    pub fn reversal_id_for(original: EntityId) -> EntityId {
        EntityId::derived(&format!("ledger-reversal:{original}"))
    }

    pub fn id(&self) -> EntityId {
        self.id
    }

    pub fn entry_type(&self) -> LedgerEntryType {
        self.entry_type
    }

    pub fn status(&self) -> LedgerEntryStatus {
        self.status
    }

    pub fn amount(&self) -> Money {
        self.amount
    }

    pub fn currency(&self) -> &Currency {
        &self.currency
    }

    pub fn order_id(&self) -> Option<EntityId> {
        self.order_id
    }

    pub fn booking_id(&self) -> Option<EntityId> {
        self.booking_id
    }

    pub fn payment_ref(&self) -> Option<&CorrelationRef> {
        self.payment_ref.as_ref()
    }

    pub fn idempotency_key(&self) -> Option<&str> {
        self.idempotency_key.as_deref()
    }

    pub fn reversed_entry_id(&self) -> Option<EntityId> {
        self.reversed_entry_id
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn actor(&self) -> &str {
        &self.actor
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// True for an entry that reverses another.
    pub fn is_reversal(&self) -> bool {
        self.reversed_entry_id.is_some()
    }
}

impl Entity for LedgerEntry {
    const COLLECTION: &'static str = collections::LEDGER_ENTRIES;

    fn document_id(&self) -> String {
        self.id.to_string()
    }

    fn version(&self) -> Version {
        self.version
    }

    fn set_version(&mut self, version: Version) {
        self.version = version;
    }
}
