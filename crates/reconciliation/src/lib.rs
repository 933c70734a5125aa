//! Payment-driven reconciliation engine.
//!
//! This crate provides:
//! - The payment gateway adapter (hosted checkout and verification)
//! - Inventory reserve/release/commit keyed by order or booking
//! - The append-only ledger poster
//! - Exactly-once customer payment emails
//! - The reconciliation orchestrator tying them together
//! - Checkout and staff fulfillment services

pub mod checkout;
pub mod error;
pub mod fulfillment;
pub mod gateway;
pub mod inventory;
pub mod ledger;
pub mod notification;
pub mod orchestrator;
pub mod settings;
pub mod steps;

pub use checkout::{
    BookingCheckout, CartLine, CheckoutReceipt, CheckoutService, OrderCheckout,
};
pub use error::{GatewayError, NotificationError, ReconcileError, Result};
pub use fulfillment::{Advanced, FulfillmentService};
pub use gateway::{
    GatewayPayload, HttpPaymentGateway, InMemoryPaymentGateway, PaymentGateway, PaymentRequest,
    RawTransaction, Verification, VerificationStatus,
};
pub use inventory::{InventoryAdjuster, InventoryOutcome};
pub use ledger::{LedgerFilter, LedgerPoster, PostResult};
pub use notification::{
    EmailMessage, HttpMailer, InMemoryMailer, LogMailer, Mailer, NotificationDispatcher,
    NotifyOutcome,
};
pub use orchestrator::{Reconciler, SYSTEM_ACTOR};
pub use settings::{LedgerSettings, PricingRules, ReconcileSettings};
pub use steps::{ReconcileOutcome, ReconcileReport, StepReport, StepStatus};
