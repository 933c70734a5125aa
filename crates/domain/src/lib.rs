//! Domain layer for the storefront.
//!
//! This crate provides:
//! - Money and currency value objects
//! - The order and booking status state machines
//! - Order, Booking, Product, PaymentSession and LedgerEntry records
//! - A typed repository with optimistic concurrency over the document store

pub mod booking;
pub mod entity;
pub mod error;
pub mod ledger;
pub mod lifecycle;
pub mod money;
pub mod order;
pub mod payment;
pub mod product;
pub mod purchase;
pub mod repository;

pub use booking::{Booking, BookingStatus};
pub use entity::{Entity, collections};
pub use error::{DomainError, Result};
pub use ledger::{LedgerEntry, LedgerEntryStatus, LedgerEntryType, NewLedgerEntry};
pub use lifecycle::{
    InventoryFlags, Lifecycle, Milestone, Status, StatusChange, TransitionError,
    validate_transition,
};
pub use money::{Currency, Money};
pub use order::{
    Customer, LineItem, LineItemKind, Order, OrderStatus, PaymentSnapshot, Pricing, ProductId,
};
pub use payment::{EmailGuard, NotificationKind, PaymentSession, PaymentStatus, PaymentTarget};
pub use product::{InventoryError, InventoryRecord, Product, ProductStatus};
pub use purchase::{Purchase, PurchaseKind};
pub use repository::{MAX_CONFLICT_RETRIES, Mutation, Repository, UpdateResult};
