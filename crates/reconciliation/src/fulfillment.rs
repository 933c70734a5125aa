//! Staff-driven status changes after payment.

use chrono::Utc;
use common::EntityId;
use document_store::DocumentStore;
use domain::{
    Booking, BookingStatus, LedgerEntryType, Milestone, Mutation, Order, OrderStatus, Purchase,
    PurchaseKind, Repository, Status,
};

use crate::error::{ReconcileError, Result};
use crate::inventory::{InventoryAdjuster, InventoryOutcome};
use crate::ledger::{LedgerFilter, LedgerPoster};

/// Result of a staff transition.
#[derive(Debug, Clone)]
pub struct Advanced<P> {
    /// The record after the transition.
    pub record: P,

    /// Set when the transition released the record's stock reservation.
    pub inventory: Option<InventoryOutcome>,

    /// Set when completing the record committed its stock.
    pub committed: Option<InventoryOutcome>,

    /// Reversal entries posted for a refund.
    pub reversals: Vec<EntityId>,
}

/// Applies validated status changes requested by staff.
pub struct FulfillmentService<S> {
    store: S,
    inventory: InventoryAdjuster<S>,
    ledger: LedgerPoster<S>,
}

impl<S> FulfillmentService<S>
where
    S: DocumentStore + Clone,
{
    pub fn new(store: S) -> Self {
        Self {
            inventory: InventoryAdjuster::new(store.clone()),
            ledger: LedgerPoster::new(store.clone()),
            store,
        }
    }

    pub async fn get_order(&self, id: EntityId) -> Result<Order> {
        self.load::<Order>(id).await
    }

    pub async fn get_booking(&self, id: EntityId) -> Result<Booking> {
        self.load::<Booking>(id).await
    }

    /// Moves an order to `status`.
    pub async fn advance_order(
        &self,
        id: EntityId,
        status: OrderStatus,
        actor: &str,
        reason: Option<String>,
    ) -> Result<Advanced<Order>> {
        self.advance::<Order>(id, status, actor, reason).await
    }

    /// Moves a booking to `status`.
    pub async fn advance_booking(
        &self,
        id: EntityId,
        status: BookingStatus,
        actor: &str,
        reason: Option<String>,
    ) -> Result<Advanced<Booking>> {
        self.advance::<Booking>(id, status, actor, reason).await
    }

    async fn load<P: Purchase>(&self, id: EntityId) -> Result<P> {
        let purchases: Repository<S, P> = Repository::new(self.store.clone());
        Ok(purchases.require(&id.to_string()).await?)
    }

    /// Applies the transition, then its follow-up effects.
    ///
    /// Canceling or refunding releases a reservation that was never
    /// committed. Refunding also reverses every payment entry posted for the
    /// record. Completing commits stock that was still only held.
    /// A rejected transition writes nothing.
    #[tracing::instrument(skip(self, reason), fields(kind = P::KIND.as_str(), to = %status))]
    async fn advance<P: Purchase>(
        &self,
        id: EntityId,
        status: P::Status,
        actor: &str,
        reason: Option<String>,
    ) -> Result<Advanced<P>> {
        if actor.trim().is_empty() {
            return Err(ReconcileError::Validation("actor is required".to_string()));
        }

        let purchases: Repository<S, P> = Repository::new(self.store.clone());
        let now = Utc::now();
        let updated = purchases
            .update_with(&id.to_string(), |purchase| {
                purchase.transition(status, actor, reason.clone(), now)?;
                Ok(Mutation::Changed(()))
            })
            .await?;
        let record = updated.entity;
        tracing::info!(%id, actor, "status changed");

        let mut advanced = Advanced {
            record,
            inventory: None,
            committed: None,
            reversals: Vec::new(),
        };

        let milestone = status.milestone();
        if matches!(milestone, Some(Milestone::Canceled | Milestone::Refunded)) {
            // Only an uncommitted reservation touches stock.
            advanced.inventory = Some(self.inventory.release::<P>(id).await?);
        }
        if milestone == Some(Milestone::Completed) {
            advanced.committed = Some(self.inventory.commit::<P>(id).await?);
        }
        if milestone == Some(Milestone::Refunded) {
            let refund_reason = reason.unwrap_or_else(|| "refund".to_string());
            advanced.reversals = self.reverse_payments::<P>(id, &refund_reason, actor).await?;
        }
        if advanced.inventory.is_some() || advanced.committed.is_some() {
            // Stock flags changed after the status write.
            advanced.record = self.load::<P>(id).await?;
        }
        Ok(advanced)
    }

    async fn reverse_payments<P: Purchase>(
        &self,
        id: EntityId,
        reason: &str,
        actor: &str,
    ) -> Result<Vec<EntityId>> {
        let filter = match P::KIND {
            PurchaseKind::Order => LedgerFilter {
                order_id: Some(id),
                ..Default::default()
            },
            PurchaseKind::Booking => LedgerFilter {
                booking_id: Some(id),
                ..Default::default()
            },
        };
        let entries = self
            .ledger
            .unreversed_payments(LedgerEntryType::payment_for(P::KIND), filter)
            .await?;

        let mut reversals = Vec::with_capacity(entries.len());
        for entry in entries {
            match self.ledger.reverse(entry.id(), reason, actor).await {
                Ok(reversal_id) => reversals.push(reversal_id),
                Err(ReconcileError::AlreadyReversed(_)) => {}
                Err(e) => return Err(e),
            }
        }
        if reversals.is_empty() {
            tracing::info!(%id, "refund had no payment entry to reverse");
        }
        Ok(reversals)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::LedgerSettings;
    use chrono::Duration;
    use common::CorrelationRef;
    use document_store::InMemoryDocumentStore;
    use domain::{
        Currency, Customer, DomainError, LineItem, Money, NewLedgerEntry, Pricing, Product,
        TransitionError,
    };

    fn ngn() -> Currency {
        Currency::parse("NGN").unwrap()
    }

    async fn reserved_order(store: &InMemoryDocumentStore) -> Order {
        Repository::new(store.clone())
            .insert(&mut Product::new("widget", "Widget", Money::from_major(10), 5))
            .await
            .unwrap();
        let items = vec![LineItem::product("widget", "Widget", 2, Money::from_major(10))];
        let pricing =
            Pricing::compute(&items, Money::zero(), Money::zero(), Money::zero(), ngn()).unwrap();
        let mut order = Order::new(
            Customer::new("ada@example.com", "Ada"),
            items,
            pricing,
            "customer",
            Utc::now(),
        );
        InventoryAdjuster::new(store.clone())
            .insert_reserved(&mut order, Vec::new())
            .await
            .unwrap();
        order
    }

    async fn widget(store: &InMemoryDocumentStore) -> Product {
        Repository::new(store.clone()).require("widget").await.unwrap()
    }

    #[tokio::test]
    async fn test_cancel_releases_reservation() {
        let store = InMemoryDocumentStore::new();
        let order = reserved_order(&store).await;
        let service = FulfillmentService::new(store.clone());

        let advanced = service
            .advance_order(order.id(), OrderStatus::Canceled, "staff", Some("out of time".into()))
            .await
            .unwrap();
        assert_eq!(advanced.record.status(), OrderStatus::Canceled);
        assert_eq!(advanced.inventory, Some(InventoryOutcome::Applied { products: 1 }));
        assert!(advanced.record.lifecycle().canceled_at().is_some());
        assert_eq!(widget(&store).await.inventory.reserved, 0);
    }

    #[tokio::test]
    async fn test_rejected_transition_writes_nothing() {
        let store = InMemoryDocumentStore::new();
        let order = reserved_order(&store).await;
        let service = FulfillmentService::new(store.clone());

        let err = service
            .advance_order(order.id(), OrderStatus::Pending, "staff", None)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ReconcileError::Domain(DomainError::Transition(TransitionError::Unchanged { .. }))
        ));
        let stored = service.get_order(order.id()).await.unwrap();
        assert_eq!(stored.lifecycle().history().len(), 1);
        assert_eq!(widget(&store).await.inventory.reserved, 2);
    }

    #[tokio::test]
    async fn test_forward_progress_and_terminal() {
        let store = InMemoryDocumentStore::new();
        let order = reserved_order(&store).await;
        let service = FulfillmentService::new(store);

        for status in [OrderStatus::Paid, OrderStatus::Shipped, OrderStatus::Completed] {
            service
                .advance_order(order.id(), status, "staff", None)
                .await
                .unwrap();
        }
        let err = service
            .advance_order(order.id(), OrderStatus::Refunded, "staff", None)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ReconcileError::Domain(DomainError::Transition(TransitionError::FromTerminal { .. }))
        ));
    }

    #[tokio::test]
    async fn test_unpaid_order_cannot_skip_to_fulfillment() {
        let store = InMemoryDocumentStore::new();
        let order = reserved_order(&store).await;
        let service = FulfillmentService::new(store.clone());

        for status in [OrderStatus::Processing, OrderStatus::Completed] {
            let err = service
                .advance_order(order.id(), status, "staff", None)
                .await
                .unwrap_err();
            assert!(matches!(
                err,
                ReconcileError::Domain(DomainError::Transition(TransitionError::SkipsPayment { .. }))
            ));
        }
        assert_eq!(service.get_order(order.id()).await.unwrap().status(), OrderStatus::Pending);
        assert_eq!(widget(&store).await.inventory.reserved, 2);
    }

    #[tokio::test]
    async fn test_completion_commits_held_stock() {
        let store = InMemoryDocumentStore::new();
        let order = reserved_order(&store).await;
        let service = FulfillmentService::new(store.clone());
        service
            .advance_order(order.id(), OrderStatus::Paid, "staff", None)
            .await
            .unwrap();

        let advanced = service
            .advance_order(order.id(), OrderStatus::Completed, "staff", None)
            .await
            .unwrap();
        assert_eq!(advanced.committed, Some(InventoryOutcome::Applied { products: 1 }));
        assert!(advanced.record.inventory().inventory_updated);

        let stock = widget(&store).await.inventory;
        assert_eq!((stock.quantity, stock.reserved, stock.available), (3, 0, 3));
    }

    #[tokio::test]
    async fn test_refund_of_paid_order_reverses_payment() {
        let store = InMemoryDocumentStore::new();
        let order = reserved_order(&store).await;
        let service = FulfillmentService::new(store.clone());
        service
            .advance_order(order.id(), OrderStatus::Paid, "system", None)
            .await
            .unwrap();

        let ledger = LedgerPoster::new(store.clone());
        let posted = ledger
            .post(
                NewLedgerEntry::payment(
                    PurchaseKind::Order,
                    order.id(),
                    Money::from_major(20),
                    ngn(),
                    CorrelationRef::parse("ORD-refund").unwrap(),
                ),
                Some("ORD-refund"),
                &LedgerSettings::default(),
            )
            .await
            .unwrap()
            .unwrap();

        let advanced = service
            .advance_order(order.id(), OrderStatus::Refunded, "staff", Some("damaged".into()))
            .await
            .unwrap();
        assert_eq!(advanced.reversals.len(), 1);
        assert_eq!(advanced.inventory, Some(InventoryOutcome::Applied { products: 1 }));

        let reversal = ledger.get(advanced.reversals[0]).await.unwrap().unwrap();
        assert_eq!(reversal.reversed_entry_id(), Some(posted.id()));
        assert_eq!(reversal.amount(), Money::from_major(-20));
    }

    #[tokio::test]
    async fn test_booking_no_show_after_payment() {
        let store = InMemoryDocumentStore::new();
        let items = vec![LineItem::service("massage", "Massage", 1, Money::from_major(150))];
        let pricing =
            Pricing::compute(&items, Money::zero(), Money::zero(), Money::zero(), ngn()).unwrap();
        let mut booking = Booking::new(
            Customer::new("ada@example.com", "Ada"),
            items,
            pricing,
            Utc::now() + Duration::days(1),
            "customer",
            Utc::now(),
        );
        Repository::new(store.clone())
            .insert(&mut booking)
            .await
            .unwrap();
        let service = FulfillmentService::new(store);

        assert!(
            service
                .advance_booking(booking.id(), BookingStatus::NoShow, "staff", None)
                .await
                .is_err()
        );
        service
            .advance_booking(booking.id(), BookingStatus::Paid, "system", None)
            .await
            .unwrap();
        let advanced = service
            .advance_booking(booking.id(), BookingStatus::NoShow, "staff", None)
            .await
            .unwrap();
        assert_eq!(advanced.record.status(), BookingStatus::NoShow);
    }

    #[tokio::test]
    async fn test_missing_record_is_not_found() {
        let service = FulfillmentService::new(InMemoryDocumentStore::new());
        let err = service.get_order(EntityId::new()).await.unwrap_err();
        assert!(matches!(err, ReconcileError::Domain(DomainError::NotFound { .. })));
    }
}
