//! Behavior shared by orders and bookings.

use chrono::{DateTime, Utc};
use common::{CorrelationRef, EntityId};
use serde::{Deserialize, Serialize};

use crate::entity::Entity;
use crate::lifecycle::{InventoryFlags, Lifecycle, Status, TransitionError};
use crate::order::{Customer, LineItem, PaymentSnapshot, Pricing};

/// Which kind of record a payment is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PurchaseKind {
    Order,
    Booking,
}

impl PurchaseKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PurchaseKind::Order => "order",
            PurchaseKind::Booking => "booking",
        }
    }
}

impl std::fmt::Display for PurchaseKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A payable record: an order or a booking.
///
/// Reconciliation, inventory and ledger code is written once against this
/// trait and works for both.
pub trait Purchase: Entity {
    /// The status state machine of this record.
    type Status: Status;

    const KIND: PurchaseKind;

    fn id(&self) -> EntityId;

    fn customer(&self) -> &Customer;

    fn items(&self) -> &[LineItem];

    fn pricing(&self) -> &Pricing;

    fn lifecycle(&self) -> &Lifecycle<Self::Status>;

    fn lifecycle_mut(&mut self) -> &mut Lifecycle<Self::Status>;

    fn inventory(&self) -> &InventoryFlags;

    fn inventory_mut(&mut self) -> &mut InventoryFlags;

    fn payment(&self) -> Option<&PaymentSnapshot>;

    fn set_payment(&mut self, payment: PaymentSnapshot);

    fn transaction_ref(&self) -> Option<&CorrelationRef>;

    fn set_transaction_ref(&mut self, reference: CorrelationRef);

    /// Returns the current status.
    fn status(&self) -> Self::Status {
        self.lifecycle().status()
    }

    /// Applies a validated status transition.
    fn transition(
        &mut self,
        to: Self::Status,
        actor: &str,
        reason: Option<String>,
        at: DateTime<Utc>,
    ) -> Result<(), TransitionError> {
        self.lifecycle_mut().transition(to, actor, reason, at)
    }

    /// Returns true if any line item is a product.
    fn has_product_items(&self) -> bool {
        self.items().iter().any(LineItem::is_product)
    }
}
