//! Value objects shared by orders and bookings.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{DomainError, Result};
use crate::money::{Currency, Money};

/// Product identifier (SKU).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductId(String);

impl ProductId {
    /// Creates a new product ID from a string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the product ID as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ProductId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for ProductId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ProductId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl AsRef<str> for ProductId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Contact details of the paying customer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    pub email: String,
    pub name: String,
    #[serde(default)]
    pub phone: Option<String>,
}

impl Customer {
    /// Creates a customer with an email address and display name.
    pub fn new(email: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            name: name.into(),
            phone: None,
        }
    }

    /// Returns true if the email looks deliverable (`local@domain.tld`).
    pub fn has_valid_email(&self) -> bool {
        match self.email.split_once('@') {
            Some((local, domain)) => {
                !local.is_empty()
                    && domain.contains('.')
                    && !domain.starts_with('.')
                    && !domain.ends_with('.')
                    && !self.email.contains(char::is_whitespace)
            }
            None => false,
        }
    }
}

/// What a line item sells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LineItemKind {
    /// A physical product; may be inventory-tracked.
    Product,
    /// A bookable service; never touches inventory.
    Service,
}

/// A line item of an order or booking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    pub kind: LineItemKind,

    /// The product or service identifier.
    pub product_id: ProductId,

    /// Human-readable name at time of purchase.
    pub name: String,

    pub quantity: u32,

    /// Price per unit in minor units.
    pub unit_price: Money,
}

impl LineItem {
    /// Creates a product line item.
    pub fn product(
        product_id: impl Into<ProductId>,
        name: impl Into<String>,
        quantity: u32,
        unit_price: Money,
    ) -> Self {
        Self {
            kind: LineItemKind::Product,
            product_id: product_id.into(),
            name: name.into(),
            quantity,
            unit_price,
        }
    }

    /// Creates a service line item.
    pub fn service(
        service_id: impl Into<ProductId>,
        name: impl Into<String>,
        quantity: u32,
        unit_price: Money,
    ) -> Self {
        Self {
            kind: LineItemKind::Service,
            product_id: service_id.into(),
            name: name.into(),
            quantity,
            unit_price,
        }
    }

    /// Returns the total price for this item (quantity * unit_price), or
    /// `None` if it does not fit in `Money`.
    pub fn total_price(&self) -> Option<Money> {
        self.unit_price.checked_multiply(self.quantity)
    }

    /// Returns true for product items.
    pub fn is_product(&self) -> bool {
        self.kind == LineItemKind::Product
    }
}

/// Price breakdown computed at checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pricing {
    pub subtotal: Money,
    pub tax: Money,
    pub shipping: Money,
    pub discount: Money,
    pub total: Money,
    pub currency: Currency,
}

impl Pricing {
    /// Computes pricing from line items and adjustments.
    ///
    /// `total = subtotal + tax + shipping - discount`. Adjustments must not be
    /// negative, the discount may not exceed the subtotal, and any overflow
    /// is rejected.
    pub fn compute(
        items: &[LineItem],
        tax: Money,
        shipping: Money,
        discount: Money,
        currency: Currency,
    ) -> Result<Self> {
        let too_large = || DomainError::Invalid("order amount is too large".to_string());

        for (name, amount) in [("tax", tax), ("shipping", shipping), ("discount", discount)] {
            if amount.is_negative() {
                return Err(DomainError::Invalid(format!("{name} cannot be negative")));
            }
        }

        let mut subtotal = Money::zero();
        for item in items {
            if item.unit_price.is_negative() {
                return Err(DomainError::Invalid(format!(
                    "unit price of {} cannot be negative",
                    item.product_id
                )));
            }
            let line = item.total_price().ok_or_else(too_large)?;
            subtotal = subtotal.checked_add(line).ok_or_else(too_large)?;
        }
        if discount > subtotal {
            return Err(DomainError::Invalid(format!(
                "discount {discount} exceeds the subtotal {subtotal}"
            )));
        }

        let total = subtotal
            .checked_add(tax)
            .and_then(|t| t.checked_add(shipping))
            .and_then(|t| t.checked_sub(discount))
            .ok_or_else(too_large)?;
        Ok(Self {
            subtotal,
            tax,
            shipping,
            discount,
            total,
            currency,
        })
    }
}

/// Snapshot of the confirmed payment embedded in an order or booking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentSnapshot {
    /// Method or channel reported by the gateway (card, bank_transfer, ...).
    pub method: String,
    pub amount: Money,
    pub currency: Currency,
    pub paid_at: DateTime<Utc>,
    /// Gateway-side transaction id.
    pub gateway_transaction_id: Option<String>,
}
