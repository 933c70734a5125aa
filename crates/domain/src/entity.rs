//! Persisted entity trait.

use document_store::Version;
use serde::{Serialize, de::DeserializeOwned};

/// Collection names used by the storefront.
pub mod collections {
    pub const ORDERS: &str = "orders";
    pub const BOOKINGS: &str = "bookings";
    pub const PAYMENT_SESSIONS: &str = "payment_sessions";
    pub const LEDGER_ENTRIES: &str = "ledger_entries";
    pub const PRODUCTS: &str = "products";
}

/// Trait for records persisted as documents.
///
/// The store owns the version: it is not part of the serialized body and is
/// restored from the document on every load.
pub trait Entity: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// Collection the entity lives in.
    const COLLECTION: &'static str;

    /// Returns the document id.
    fn document_id(&self) -> String;

    /// Returns the version the entity was loaded at, or `Version::initial()` if unsaved.
    fn version(&self) -> Version;

    /// Sets the version after a load or a successful write.
    fn set_version(&mut self, version: Version);
}
