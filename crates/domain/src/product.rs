//! Catalog products and their embedded inventory record.

use document_store::Version;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::entity::{Entity, collections};
use crate::money::Money;
use crate::order::ProductId;

/// Errors raised by stock adjustments.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InventoryError {
    /// The adjustment would drive available stock below zero.
    #[error("Insufficient stock for {product_id}: requested {requested}, available {available}")]
    InsufficientStock {
        product_id: ProductId,
        requested: u32,
        available: i64,
    },

    /// A line item references a product that does not exist.
    #[error("Unknown product: {0}")]
    UnknownProduct(ProductId),
}

/// Catalog visibility of a product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ProductStatus {
    #[default]
    Active,
    OutOfStock,
    Draft,
}

/// Stock counters embedded in a product.
///
/// `available` is denormalized and recomputed on every change as
/// `max(0, quantity - reserved)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct InventoryRecord {
    /// On-hand units.
    pub quantity: i64,

    /// Units held against open orders.
    pub reserved: i64,

    /// Units that can still be reserved.
    pub available: i64,
}

impl InventoryRecord {
    /// Creates a record with nothing reserved.
    pub fn new(quantity: i64) -> Self {
        let mut record = Self {
            quantity,
            reserved: 0,
            available: 0,
        };
        record.recompute();
        record
    }

    fn recompute(&mut self) {
        self.available = (self.quantity - self.reserved).max(0);
    }

    /// Returns `quantity - reserved` without flooring.
    fn headroom(&self) -> i64 {
        self.quantity - self.reserved
    }
}

/// A product in the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,

    #[serde(skip)]
    version: Version,

    pub name: String,
    pub unit_price: Money,

    #[serde(default)]
    pub status: ProductStatus,

    /// When false the product never touches inventory.
    #[serde(default = "default_track_inventory")]
    pub track_inventory: bool,

    #[serde(default)]
    pub inventory: InventoryRecord,
}

fn default_track_inventory() -> bool {
    true
}

impl Product {
    /// Creates an active, inventory-tracked product.
    pub fn new(
        id: impl Into<ProductId>,
        name: impl Into<String>,
        unit_price: Money,
        quantity: i64,
    ) -> Self {
        let mut product = Self {
            id: id.into(),
            version: Version::initial(),
            name: name.into(),
            unit_price,
            status: ProductStatus::Active,
            track_inventory: true,
            inventory: InventoryRecord::new(quantity),
        };
        product.refresh_status();
        product
    }

    /// Disables inventory tracking.
    pub fn untracked(mut self) -> Self {
        self.track_inventory = false;
        if self.status == ProductStatus::OutOfStock {
            self.status = ProductStatus::Active;
        }
        self
    }

    /// Holds `quantity` units against an open order.
    pub fn reserve(&mut self, quantity: u32) -> Result<(), InventoryError> {
        let qty = i64::from(quantity);
        if self.inventory.headroom() - qty < 0 {
            return Err(InventoryError::InsufficientStock {
                product_id: self.id.clone(),
                requested: quantity,
                available: self.inventory.available,
            });
        }
        self.inventory.reserved += qty;
        self.inventory.recompute();
        Ok(())
    }

    /// Returns `quantity` held units to available stock; `reserved` floors at zero.
    pub fn release(&mut self, quantity: u32) {
        self.inventory.reserved = (self.inventory.reserved - i64::from(quantity)).max(0);
        self.inventory.recompute();
    }

    /// Removes `quantity` paid-for units from stock.
    ///
    /// Decrements both `quantity` and `reserved`, so a reserved order leaves
    /// `available` unchanged. Rejected if on-hand stock would go negative.
    pub fn commit(&mut self, quantity: u32) -> Result<(), InventoryError> {
        let qty = i64::from(quantity);
        if self.inventory.quantity < qty {
            return Err(InventoryError::InsufficientStock {
                product_id: self.id.clone(),
                requested: quantity,
                available: self.inventory.quantity,
            });
        }
        self.inventory.quantity -= qty;
        self.inventory.reserved = (self.inventory.reserved - qty).max(0);
        self.inventory.recompute();
        self.refresh_status();
        Ok(())
    }

    /// Flips between active and out-of-stock based on available units.
    ///
    /// Draft products keep their status.
    fn refresh_status(&mut self) {
        match self.status {
            ProductStatus::Active if self.inventory.available <= 0 => {
                self.status = ProductStatus::OutOfStock;
            }
            ProductStatus::OutOfStock if self.inventory.available > 0 => {
                self.status = ProductStatus::Active;
            }
            _ => {}
        }
    }
}

impl Entity for Product {
    const COLLECTION: &'static str = collections::PRODUCTS;

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

#[cfg(test)]
mod tests {
    use super::*;

    fn widget(quantity: i64) -> Product {
        Product::new("SKU-001", "Widget", Money::from_cents(1000), quantity)
    }

    fn assert_available_invariant(p: &Product) {
        assert_eq!(
            p.inventory.available,
            (p.inventory.quantity - p.inventory.reserved).max(0)
        );
        assert!(p.inventory.available >= 0);
    }

    #[test]
    fn test_reserve_then_commit() {
        let mut p = widget(5);
        p.reserve(2).unwrap();
        assert_eq!((p.inventory.reserved, p.inventory.available), (2, 3));
        assert_available_invariant(&p);

        p.commit(2).unwrap();
        assert_eq!(p.inventory, InventoryRecord {
            quantity: 3,
            reserved: 0,
            available: 3
        });
        assert_eq!(p.status, ProductStatus::Active);
    }

    #[test]
    fn test_reserve_beyond_available_is_rejected_without_change() {
        let mut p = widget(2);
        let before = p.clone();
        let err = p.reserve(3).unwrap_err();
        assert_eq!(
            err,
            InventoryError::InsufficientStock {
                product_id: ProductId::new("SKU-001"),
                requested: 3,
                available: 2
            }
        );
        assert_eq!(p, before);
    }

    #[test]
    fn test_release_floors_reserved_at_zero() {
        let mut p = widget(5);
        p.reserve(1).unwrap();
        p.release(4);
        assert_eq!(p.inventory.reserved, 0);
        assert_eq!(p.inventory.available, 5);
        assert_available_invariant(&p);
    }

    #[test]
    fn test_commit_to_zero_marks_out_of_stock() {
        let mut p = widget(2);
        p.reserve(2).unwrap();
        p.commit(2).unwrap();
        assert_eq!(p.inventory.available, 0);
        assert_eq!(p.status, ProductStatus::OutOfStock);
    }

    #[test]
    fn test_commit_without_reservation_reduces_available() {
        let mut p = widget(5);
        p.commit(2).unwrap();
        assert_eq!(p.inventory, InventoryRecord {
            quantity: 3,
            reserved: 0,
            available: 3
        });
    }

    #[test]
    fn test_commit_beyond_on_hand_is_rejected() {
        let mut p = widget(1);
        assert!(p.commit(2).is_err());
        assert_eq!(p.inventory.quantity, 1);
    }

    #[test]
    fn test_out_of_stock_returns_to_active_when_available() {
        let mut p = widget(0);
        assert_eq!(p.status, ProductStatus::OutOfStock);

        p.inventory.quantity = 4;
        p.commit(1).unwrap();
        assert_eq!(p.status, ProductStatus::Active);
    }

    #[test]
    fn test_draft_status_is_left_alone() {
        let mut p = widget(1);
        p.status = ProductStatus::Draft;
        p.commit(1).unwrap();
        assert_eq!(p.status, ProductStatus::Draft);
    }

    #[test]
    fn test_deserialize_defaults() {
        let json = serde_json::json!({
            "id": "SKU-9",
            "name": "Mug",
            "unit_price": 500
        });
        let p: Product = serde_json::from_value(json).unwrap();
        assert!(p.track_inventory);
        assert_eq!(p.status, ProductStatus::Active);
        assert_eq!(p.inventory, InventoryRecord::default());
    }
}
