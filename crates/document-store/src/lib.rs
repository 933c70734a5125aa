//! Versioned JSON document persistence.
//!
//! Documents live in named collections and carry a monotonically increasing
//! [`Version`] used for optimistic concurrency. Writes are grouped into
//! batches that are applied all-or-nothing, which is the only atomicity
//! guarantee the store offers.

pub mod document;
pub mod error;
pub mod memory;
pub mod postgres;
pub mod query;
pub mod store;

pub use document::{Document, Version};
pub use error::{Result, StoreError};
pub use memory::InMemoryDocumentStore;
pub use postgres::PostgresDocumentStore;
pub use query::DocumentQuery;
pub use store::{DocumentStore, DocumentStoreExt, WriteOp};
