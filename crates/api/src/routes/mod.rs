//! HTTP route handlers.

pub mod checkout;
pub mod health;
pub mod ledger;
pub mod metrics;
pub mod payments;
pub mod products;
pub mod purchases;

use common::EntityId;

use crate::error::ApiError;

fn parse_entity_id(id: &str) -> Result<EntityId, ApiError> {
    EntityId::parse(id).map_err(|e| ApiError::BadRequest(format!("Invalid ID format: {e}")))
}
