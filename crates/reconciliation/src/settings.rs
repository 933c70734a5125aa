//! Runtime switches handed to every reconciliation call.

use domain::{Currency, DomainError, LineItem, Money, Pricing, Result as DomainResult};
use serde::{Deserialize, Serialize};

/// Ledger posting switches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerSettings {
    /// Master switch; when off no entry is ever posted automatically.
    pub enabled: bool,

    /// When on, staff create entries by hand and automatic posting is skipped.
    pub manual_generation: bool,
}

impl LedgerSettings {
    /// Returns true if automatic posting should create entries.
    pub fn auto_posting(&self) -> bool {
        self.enabled && !self.manual_generation
    }
}

impl Default for LedgerSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            manual_generation: false,
        }
    }
}

/// Snapshot of configuration read once per reconciliation call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileSettings {
    pub ledger: LedgerSettings,

    /// Whether gateway webhooks may trigger reconciliation.
    pub webhooks_enabled: bool,
}

impl Default for ReconcileSettings {
    fn default() -> Self {
        Self {
            ledger: LedgerSettings::default(),
            webhooks_enabled: true,
        }
    }
}

impl ReconcileSettings {
    /// Returns settings with automatic ledger posting turned off.
    pub fn without_ledger(mut self) -> Self {
        self.ledger.enabled = false;
        self
    }
}

/// Store-side price adjustments applied at checkout.
///
/// Customers never supply tax, shipping or discounts; checkout derives them
/// from these rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PricingRules {
    /// Tax rate in basis points of the subtotal (750 = 7.5%).
    pub tax_rate_bps: u32,

    /// Flat shipping fee added to orders. Bookings never ship.
    pub order_shipping: Money,
}

impl PricingRules {
    /// Prices order lines.
    pub fn price_order(&self, items: &[LineItem], currency: Currency) -> DomainResult<Pricing> {
        self.price(items, self.order_shipping, currency)
    }

    /// Prices booking lines.
    pub fn price_booking(&self, items: &[LineItem], currency: Currency) -> DomainResult<Pricing> {
        self.price(items, Money::zero(), currency)
    }

    fn price(
        &self,
        items: &[LineItem],
        shipping: Money,
        currency: Currency,
    ) -> DomainResult<Pricing> {
        let untaxed =
            Pricing::compute(items, Money::zero(), Money::zero(), Money::zero(), currency)?;
        let tax = untaxed
            .subtotal
            .checked_basis_points(self.tax_rate_bps)
            .ok_or_else(|| DomainError::Invalid("order amount is too large".to_string()))?;
        Pricing::compute(items, tax, shipping, Money::zero(), untaxed.currency)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ngn() -> Currency {
        Currency::parse("NGN").unwrap()
    }

    #[test]
    fn test_pricing_rules() {
        let rules = PricingRules {
            tax_rate_bps: 750,
            order_shipping: Money::from_major(500),
        };
        let items = vec![LineItem::product("widget", "Widget", 2, Money::from_major(1000))];

        let order = rules.price_order(&items, ngn()).unwrap();
        assert_eq!(order.subtotal, Money::from_major(2000));
        assert_eq!(order.tax, Money::from_major(150));
        assert_eq!(order.shipping, Money::from_major(500));
        assert_eq!(order.discount, Money::zero());
        assert_eq!(order.total, Money::from_major(2650));

        let booking = rules.price_booking(&items, ngn()).unwrap();
        assert_eq!(booking.shipping, Money::zero());
        assert_eq!(booking.total, Money::from_major(2150));
    }

    #[test]
    fn test_auto_posting() {
        assert!(LedgerSettings::default().auto_posting());
        assert!(
            !LedgerSettings {
                enabled: false,
                manual_generation: false
            }
            .auto_posting()
        );
        assert!(
            !LedgerSettings {
                enabled: true,
                manual_generation: true
            }
            .auto_posting()
        );
        assert!(!ReconcileSettings::default().without_ledger().ledger.auto_posting());
    }
}
