//! Checkout: creates an order or booking, reserves stock and opens a
//! hosted payment session.

use chrono::{DateTime, Utc};
use common::{CorrelationRef, EntityId};
use document_store::DocumentStore;
use domain::{
    Booking, Currency, Customer, InventoryError, LineItem, Money, Mutation, Order, PaymentSession,
    PaymentStatus, PaymentTarget, Pricing, Product, ProductId, ProductStatus, Purchase,
    PurchaseKind, Repository, Status,
};
use serde::{Deserialize, Serialize};

use crate::error::{ReconcileError, Result};
use crate::gateway::{PaymentGateway, PaymentRequest};
use crate::inventory::InventoryAdjuster;
use crate::settings::PricingRules;

/// Reference prefix for order payments.
pub const ORDER_REF_PREFIX: &str = "ORD";

/// Reference prefix for booking payments.
pub const BOOKING_REF_PREFIX: &str = "BKG";

/// Most units of one product a single cart line may request.
pub const MAX_LINE_QUANTITY: u32 = 10_000;

const CUSTOMER_ACTOR: &str = "customer";

/// A product or service and how many units the customer wants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    pub product_id: ProductId,
    pub quantity: u32,
}

impl CartLine {
    pub fn new(product_id: impl Into<ProductId>, quantity: u32) -> Self {
        Self {
            product_id: product_id.into(),
            quantity,
        }
    }
}

/// Order checkout input. Prices and adjustments come from the catalog and
/// the store's pricing rules, never from the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderCheckout {
    pub customer: Customer,
    pub items: Vec<CartLine>,
    pub currency: Currency,
}

/// Booking checkout input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookingCheckout {
    pub customer: Customer,
    pub services: Vec<CartLine>,
    pub scheduled_for: DateTime<Utc>,
    pub currency: Currency,
    #[serde(default)]
    pub notes: Option<String>,
}

/// What the customer needs to complete payment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckoutReceipt {
    pub kind: PurchaseKind,
    pub id: EntityId,
    pub transaction_ref: CorrelationRef,
    pub checkout_url: String,
    pub amount: Money,
    pub currency: Currency,
}

/// Creates purchases and their payment sessions.
pub struct CheckoutService<S, G> {
    store: S,
    inventory: InventoryAdjuster<S>,
    gateway: G,
    pricing: PricingRules,
}

impl<S, G> CheckoutService<S, G>
where
    S: DocumentStore + Clone,
    G: PaymentGateway,
{
    pub fn new(store: S, gateway: G) -> Self {
        Self {
            inventory: InventoryAdjuster::new(store.clone()),
            store,
            gateway,
            pricing: PricingRules::default(),
        }
    }

    /// Applies tax and shipping rules to every checkout.
    pub fn with_pricing(mut self, pricing: PricingRules) -> Self {
        self.pricing = pricing;
        self
    }

    /// Places an order, reserves its stock and opens a payment session.
    ///
    /// The order, its reservation and the payment session are written in one
    /// batch before the gateway is called, so the reference is known before
    /// any gateway round-trip. Insufficient stock leaves nothing behind. If
    /// the gateway refuses, the reservation is released and the order
    /// canceled.
    #[tracing::instrument(skip(self, checkout), fields(customer = %checkout.customer.email))]
    pub async fn checkout_order(&self, checkout: OrderCheckout) -> Result<CheckoutReceipt> {
        validate_customer(&checkout.customer)?;
        let items = self
            .price_lines(&checkout.items, |product, quantity| {
                LineItem::product(
                    product.id.clone(),
                    product.name.clone(),
                    quantity,
                    product.unit_price,
                )
            })
            .await?;
        let pricing = self.pricing.price_order(&items, checkout.currency)?;
        validate_total(&pricing)?;

        let now = Utc::now();
        let reference = CorrelationRef::generate(ORDER_REF_PREFIX);
        let mut order = Order::new(checkout.customer, items, pricing, CUSTOMER_ACTOR, now);
        order.set_transaction_ref(reference.clone());

        let session = PaymentSession::new(
            reference.clone(),
            PaymentTarget::Order(order.id()),
            order.pricing().total,
            order.pricing().currency.clone(),
            order.customer().clone(),
            now,
        );
        let session_op = Repository::<S, PaymentSession>::insert_op(&session)?;
        self.inventory
            .insert_reserved(&mut order, vec![session_op])
            .await?;
        tracing::info!(order_id = %order.id(), correlation_ref = %reference, "order created");

        self.open_checkout::<Order>(&order, &session).await
    }

    /// Books a service slot and opens a payment session.
    #[tracing::instrument(skip(self, checkout), fields(customer = %checkout.customer.email))]
    pub async fn checkout_booking(&self, checkout: BookingCheckout) -> Result<CheckoutReceipt> {
        validate_customer(&checkout.customer)?;
        let now = Utc::now();
        if checkout.scheduled_for <= now {
            return Err(ReconcileError::Validation(
                "booking must be scheduled in the future".to_string(),
            ));
        }
        let items = self
            .price_lines(&checkout.services, |product, quantity| {
                LineItem::service(
                    product.id.clone(),
                    product.name.clone(),
                    quantity,
                    product.unit_price,
                )
            })
            .await?;
        let pricing = self.pricing.price_booking(&items, checkout.currency)?;
        validate_total(&pricing)?;

        let reference = CorrelationRef::generate(BOOKING_REF_PREFIX);
        let mut booking = Booking::new(
            checkout.customer,
            items,
            pricing,
            checkout.scheduled_for,
            CUSTOMER_ACTOR,
            now,
        );
        if let Some(notes) = checkout.notes {
            booking = booking.with_notes(notes);
        }
        booking.set_transaction_ref(reference.clone());

        let session = PaymentSession::new(
            reference.clone(),
            PaymentTarget::Booking(booking.id()),
            booking.pricing().total,
            booking.pricing().currency.clone(),
            booking.customer().clone(),
            now,
        );
        self.inventory
            .insert_reserved(
                &mut booking,
                vec![Repository::<S, PaymentSession>::insert_op(&session)?],
            )
            .await?;
        tracing::info!(booking_id = %booking.id(), correlation_ref = %reference, "booking created");

        self.open_checkout::<Booking>(&booking, &session).await
    }

    async fn price_lines<F>(&self, lines: &[CartLine], to_item: F) -> Result<Vec<LineItem>>
    where
        F: Fn(&Product, u32) -> LineItem,
    {
        if lines.is_empty() {
            return Err(ReconcileError::Validation(
                "at least one item is required".to_string(),
            ));
        }
        let products: Repository<S, Product> = Repository::new(self.store.clone());
        let mut items = Vec::with_capacity(lines.len());
        for line in lines {
            if line.quantity == 0 || line.quantity > MAX_LINE_QUANTITY {
                return Err(ReconcileError::Validation(format!(
                    "quantity for {} must be between 1 and {MAX_LINE_QUANTITY}",
                    line.product_id
                )));
            }
            let product = products
                .get(line.product_id.as_str())
                .await?
                .ok_or_else(|| InventoryError::UnknownProduct(line.product_id.clone()))?;
            if product.status == ProductStatus::Draft {
                return Err(ReconcileError::Validation(format!(
                    "{} is not for sale",
                    product.id
                )));
            }
            items.push(to_item(&product, line.quantity));
        }
        Ok(items)
    }

    async fn open_checkout<P: Purchase>(
        &self,
        purchase: &P,
        session: &PaymentSession,
    ) -> Result<CheckoutReceipt> {
        let request = PaymentRequest {
            reference: session.transaction_ref().clone(),
            amount: session.amount(),
            currency: session.currency().clone(),
            customer: session.customer().clone(),
            target: session.target(),
        };

        match self.gateway.initiate(&request).await {
            Ok(checkout_url) => Ok(CheckoutReceipt {
                kind: P::KIND,
                id: purchase.id(),
                transaction_ref: request.reference,
                checkout_url,
                amount: request.amount,
                currency: request.currency,
            }),
            Err(e) => {
                tracing::warn!(error = %e, "gateway refused checkout, abandoning");
                self.abandon::<P>(purchase.id(), session.transaction_ref(), &e.to_string())
                    .await;
                Err(e.into())
            }
        }
    }

    /// Undoes a checkout whose payment could not be opened.
    async fn abandon<P: Purchase>(&self, id: EntityId, reference: &CorrelationRef, reason: &str) {
        if let Err(e) = self.inventory.release::<P>(id).await {
            tracing::error!(error = %e, "could not release reservation of abandoned checkout");
        }

        let purchases: Repository<S, P> = Repository::new(self.store.clone());
        let canceled = purchases
            .update_with(&id.to_string(), |purchase| {
                if purchase.status() != <P::Status as Status>::INITIAL {
                    return Ok(Mutation::Unchanged(()));
                }
                purchase.transition(
                    <P::Status as Status>::PAYMENT_FAILED,
                    "system",
                    Some(format!("payment could not be initiated: {reason}")),
                    Utc::now(),
                )?;
                Ok(Mutation::Changed(()))
            })
            .await;
        if let Err(e) = canceled {
            tracing::error!(error = %e, "could not cancel abandoned checkout");
        }

        let sessions: Repository<S, PaymentSession> = Repository::new(self.store.clone());
        let failed = sessions
            .update_with(reference.as_str(), |session| {
                Ok(
                    if session.record_outcome(PaymentStatus::Failed, None, None, Utc::now()) {
                        Mutation::Changed(())
                    } else {
                        Mutation::Unchanged(())
                    },
                )
            })
            .await;
        if let Err(e) = failed {
            tracing::error!(error = %e, "could not close abandoned payment session");
        }
    }
}

fn validate_customer(customer: &Customer) -> Result<()> {
    if customer.name.trim().is_empty() {
        return Err(ReconcileError::Validation("customer name is required".to_string()));
    }
    if !customer.has_valid_email() {
        return Err(ReconcileError::Validation(format!(
            "invalid customer email: {}",
            customer.email
        )));
    }
    Ok(())
}

fn validate_total(pricing: &Pricing) -> Result<()> {
    if !pricing.total.is_positive() {
        return Err(ReconcileError::Validation(
            "total must be greater than zero".to_string(),
        ));
    }
    Ok(())
}
