//! Service bookings.

mod status;

pub use status::BookingStatus;

use chrono::{DateTime, Utc};
use common::{CorrelationRef, EntityId};
use document_store::Version;
use serde::{Deserialize, Serialize};

use crate::entity::{Entity, collections};
use crate::lifecycle::{InventoryFlags, Lifecycle};
use crate::order::{Customer, LineItem, PaymentSnapshot, Pricing};
use crate::purchase::{Purchase, PurchaseKind};

/// A paid reservation of a service slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Booking {
    id: EntityId,

    #[serde(skip)]
    version: Version,

    customer: Customer,
    items: Vec<LineItem>,
    pricing: Pricing,

    /// Start of the booked slot.
    scheduled_for: DateTime<Utc>,

    #[serde(default)]
    notes: Option<String>,

    #[serde(default)]
    payment: Option<PaymentSnapshot>,

    #[serde(flatten)]
    lifecycle: Lifecycle<BookingStatus>,

    #[serde(flatten)]
    inventory: InventoryFlags,

    #[serde(default)]
    transaction_ref: Option<CorrelationRef>,

    created_at: DateTime<Utc>,
}

impl Booking {
    /// Creates a new pending booking.
    pub fn new(
        customer: Customer,
        items: Vec<LineItem>,
        pricing: Pricing,
        scheduled_for: DateTime<Utc>,
        actor: &str,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: EntityId::new(),
            version: Version::initial(),
            customer,
            items,
            pricing,
            scheduled_for,
            notes: None,
            payment: None,
            lifecycle: Lifecycle::start(actor, at),
            inventory: InventoryFlags::default(),
            transaction_ref: None,
            created_at: at,
        }
    }

    /// Attaches free-form customer notes.
    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    pub fn scheduled_for(&self) -> DateTime<Utc> {
        self.scheduled_for
    }

    pub fn notes(&self) -> Option<&str> {
        self.notes.as_deref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

impl Entity for Booking {
    const COLLECTION: &'static str = collections::BOOKINGS;

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

impl Purchase for Booking {
    type Status = BookingStatus;

    const KIND: PurchaseKind = PurchaseKind::Booking;

    fn id(&self) -> EntityId {
        self.id
    }

    fn customer(&self) -> &Customer {
        &self.customer
    }

    fn items(&self) -> &[LineItem] {
        &self.items
    }

    fn pricing(&self) -> &Pricing {
        &self.pricing
    }

    fn lifecycle(&self) -> &Lifecycle<BookingStatus> {
        &self.lifecycle
    }

    fn lifecycle_mut(&mut self) -> &mut Lifecycle<BookingStatus> {
        &mut self.lifecycle
    }

    fn inventory(&self) -> &InventoryFlags {
        &self.inventory
    }

    fn inventory_mut(&mut self) -> &mut InventoryFlags {
        &mut self.inventory
    }

    fn payment(&self) -> Option<&PaymentSnapshot> {
        self.payment.as_ref()
    }

    fn set_payment(&mut self, payment: PaymentSnapshot) {
        self.payment = Some(payment);
    }

    fn transaction_ref(&self) -> Option<&CorrelationRef> {
        self.transaction_ref.as_ref()
    }

    fn set_transaction_ref(&mut self, reference: CorrelationRef) {
        self.transaction_ref = Some(reference);
    }
}
