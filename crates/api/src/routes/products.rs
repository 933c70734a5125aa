//! Catalog endpoints used to seed and inspect stock.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use document_store::DocumentStore;
use domain::{Money, Product, ProductStatus, Repository};
use serde::Deserialize;

use crate::AppState;
use crate::error::ApiError;

#[derive(Deserialize)]
pub struct CreateProductRequest {
    pub id: String,
    pub name: String,
    pub unit_price: Money,
    #[serde(default)]
    pub quantity: i64,
    #[serde(default = "default_true")]
    pub track_inventory: bool,
    #[serde(default)]
    pub draft: bool,
}

fn default_true() -> bool {
    true
}

/// POST /products: add a product to the catalog.
#[tracing::instrument(skip(state, req), fields(product_id = %req.id))]
pub async fn create<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Json(req): Json<CreateProductRequest>,
) -> Result<(StatusCode, Json<Product>), ApiError> {
    if req.id.trim().is_empty() {
        return Err(ApiError::BadRequest("product id is required".to_string()));
    }
    if req.quantity < 0 || req.unit_price.is_negative() {
        return Err(ApiError::BadRequest(
            "quantity and unit_price must not be negative".to_string(),
        ));
    }

    let mut product = Product::new(req.id, req.name, req.unit_price, req.quantity);
    if !req.track_inventory {
        product = product.untracked();
    }
    if req.draft {
        product.status = ProductStatus::Draft;
    }

    let products: Repository<S, Product> = Repository::new(state.store.clone());
    products.insert(&mut product).await?;
    Ok((StatusCode::CREATED, Json(product)))
}

/// GET /products/{id}: load a product and its inventory record.
#[tracing::instrument(skip(state))]
pub async fn get<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<Product>, ApiError> {
    let products: Repository<S, Product> = Repository::new(state.store.clone());
    let product = products
        .get(&id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Product {id} not found")))?;
    Ok(Json(product))
}
