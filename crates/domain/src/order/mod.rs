//! Customer orders for products.

mod status;
mod value_objects;

pub use status::OrderStatus;
pub use value_objects::{Customer, LineItem, LineItemKind, PaymentSnapshot, Pricing, ProductId};

use chrono::{DateTime, Utc};
use common::{CorrelationRef, EntityId};
use document_store::Version;
use serde::{Deserialize, Serialize};

use crate::entity::{Entity, collections};
use crate::lifecycle::{InventoryFlags, Lifecycle};
use crate::purchase::{Purchase, PurchaseKind};

/// A customer order for products.
///
/// Created `pending` at checkout and changed only through validated status
/// transitions. Orders are never deleted; they end `completed`, `canceled`
/// or `refunded`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    id: EntityId,

    #[serde(skip)]
    version: Version,

    customer: Customer,
    items: Vec<LineItem>,
    pricing: Pricing,

    #[serde(default)]
    payment: Option<PaymentSnapshot>,

    #[serde(flatten)]
    lifecycle: Lifecycle<OrderStatus>,

    #[serde(flatten)]
    inventory: InventoryFlags,

    /// Correlation reference of the payment session, once checkout initiated one.
    #[serde(default)]
    transaction_ref: Option<CorrelationRef>,

    created_at: DateTime<Utc>,
}

impl Order {
    /// Creates a new pending order.
    pub fn new(
        customer: Customer,
        items: Vec<LineItem>,
        pricing: Pricing,
        actor: &str,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: EntityId::new(),
            version: Version::initial(),
            customer,
            items,
            pricing,
            payment: None,
            lifecycle: Lifecycle::start(actor, at),
            inventory: InventoryFlags::default(),
            transaction_ref: None,
            created_at: at,
        }
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

impl Entity for Order {
    const COLLECTION: &'static str = collections::ORDERS;

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

impl Purchase for Order {
    type Status = OrderStatus;

    const KIND: PurchaseKind = PurchaseKind::Order;

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

    fn lifecycle(&self) -> &Lifecycle<OrderStatus> {
        &self.lifecycle
    }

    fn lifecycle_mut(&mut self) -> &mut Lifecycle<OrderStatus> {
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
