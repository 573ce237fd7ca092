//! Stock availability endpoints, served from the cache mirror.
//!
//! Quantities here lag the ledger until the next batch commits; they
//! are advisory, never an admission decision.

use axum::Json;
use axum::extract::{Path, State};
use domain::ProductId;
use serde::Serialize;

use crate::error::ApiError;
use crate::routes::orders::AppState;

#[derive(Serialize)]
pub struct StockResponse {
    pub product_id: String,
    pub quantity: u32,
}

/// GET /stock/:product_id — cached available quantity for one product.
#[tracing::instrument(skip(state))]
pub async fn get(
    State(state): State<AppState>,
    Path(product_id): Path<String>,
) -> Result<Json<StockResponse>, ApiError> {
    let product = ProductId::new(product_id);
    match state.stock.read(&product) {
        Some(quantity) => Ok(Json(StockResponse {
            product_id: product.to_string(),
            quantity,
        })),
        None => Err(ApiError::NotFound(format!("product {product} not found"))),
    }
}

/// GET /stock — all cached quantities, sorted by product.
#[tracing::instrument(skip(state))]
pub async fn list(State(state): State<AppState>) -> Json<Vec<StockResponse>> {
    let entries = state
        .stock
        .snapshot()
        .into_iter()
        .map(|entry| StockResponse {
            product_id: entry.product_id.to_string(),
            quantity: entry.quantity,
        })
        .collect();
    Json(entries)
}
